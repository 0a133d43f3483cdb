//! Error type for `clinic-store-sqlite`.

use clinic_core::{ErrorKind, store::StoreError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] clinic_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored code that no longer maps to a domain value.
  #[error("cannot decode stored value: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  fn sqlite(&self) -> Option<&rusqlite::Error> {
    match self {
      Self::Sqlite(e) | Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => Some(e),
      _ => None,
    }
  }

  /// Whether this failure is confined to the data of a single import row.
  /// Anything else means the store itself is unusable.
  pub(crate) fn is_row_level(&self) -> bool {
    match self {
      Self::Core(_) => true,
      _ => self
        .sqlite()
        .and_then(rusqlite::Error::sqlite_error_code)
        .is_some_and(|code| code == ErrorCode::ConstraintViolation),
    }
  }

  /// A foreign-key violation raised while deleting a referenced row.
  pub(crate) fn is_foreign_key_violation(&self) -> bool {
    self
      .sqlite()
      .and_then(rusqlite::Error::sqlite_error)
      .is_some_and(|e| e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
  }
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    if let Self::Core(e) = self {
      return e.kind();
    }
    match self.sqlite().and_then(rusqlite::Error::sqlite_error_code) {
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => ErrorKind::Conflict,
      _ => ErrorKind::Storage,
    }
  }
}
