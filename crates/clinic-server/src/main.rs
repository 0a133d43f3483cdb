//! clinic-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `CLINIC_*` environment variables, opens the SQLite store, and either
//! serves the JSON API or imports a CSV sheet of people.
//!
//! ```text
//! clinic-server serve
//! clinic-server import --role student --term 2025-15 students.csv
//! ```

use std::{fs::File, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use clinic_core::{person::Role, store::ClinicStore};
use clinic_server::{ServerConfig, expand_tilde, read_import_rows};
use clinic_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Legal-clinic case server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API under `/api`.
  Serve,
  /// Create or link people from a CSV sheet and print the JSON report.
  Import {
    #[arg(long, value_enum)]
    role: RoleArg,
    /// Term code the participations are recorded for.
    #[arg(long)]
    term: String,
    file: PathBuf,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
  Student,
  Supervisor,
}

impl From<RoleArg> for Role {
  fn from(role: RoleArg) -> Self {
    match role {
      RoleArg::Student => Role::Student,
      RoleArg::Supervisor => Role::Supervisor,
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CLINIC"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open_with(&store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Serve => serve(&server_cfg, store).await,
    Command::Import { role, term, file } => import(&store, role.into(), term, file).await,
  }
}

async fn serve(server_cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let app = clinic_server::app(Arc::new(store));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn import(store: &SqliteStore, role: Role, term: String, file: PathBuf) -> anyhow::Result<()> {
  let reader = File::open(&file).with_context(|| format!("failed to open {file:?}"))?;
  let rows = read_import_rows(reader).with_context(|| format!("failed to parse {file:?}"))?;
  tracing::info!(rows = rows.len(), %role, %term, "importing people");

  let report = store
    .reconcile(rows, role, term)
    .await
    .context("import failed")?;

  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}
