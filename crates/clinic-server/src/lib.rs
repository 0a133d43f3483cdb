//! Wiring for the clinic server binary: configuration, the HTTP application
//! and the CSV reader used by `clinic-server import`.

use std::{
  io,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use clinic_core::{case::CaseNumber, reconcile::ImportRow, store::ClinicStore};
use clinic_store_sqlite::StoreOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLINIC_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  /// Longest wait for the database write lock, in milliseconds.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:   u64,
  /// Only used when the database is created.
  #[serde(default = "default_first_case_number")]
  pub first_case_number: CaseNumber,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("clinic.sqlite3") }
fn default_busy_timeout_ms() -> u64 { 5_000 }
fn default_first_case_number() -> CaseNumber { 1 }

impl ServerConfig {
  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      busy_timeout:      Duration::from_millis(self.busy_timeout_ms),
      first_case_number: self.first_case_number,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application ──────────────────────────────────────────────────────────────

/// The JSON API mounted under `/api`, with request tracing.
pub fn app<S: ClinicStore + 'static>(store: Arc<S>) -> Router {
  Router::new()
    .nest("/api", clinic_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

// ─── CSV import ───────────────────────────────────────────────────────────────

/// Read import rows from a CSV sheet with a header line.
///
/// Recognised columns: `id`, `name` (as `Last, First`) or `first_names` and
/// `last_names`, `email`, and optionally `phone`, `sex`, `participation`.
/// Unknown columns are ignored and empty cells count as absent. Rows are
/// numbered from 1 starting at the first data line.
pub fn read_import_rows<R: io::Read>(reader: R) -> Result<Vec<ImportRow>, csv::Error> {
  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(reader);

  reader
    .deserialize::<ImportRow>()
    .enumerate()
    .map(|(i, row)| row.map(|row| ImportRow { row: Some(i + 1), ..row }))
    .collect()
}
