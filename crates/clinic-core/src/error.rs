//! Error types for `clinic-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{case::CaseNumber, taxonomy::NodePath};

/// The coarse category of a failure, independent of the backend that raised
/// it. Callers use it to decide whether to retry and how to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  /// Business-rule or input violation; retrying the same call fails again.
  Validation,
  /// Lock contention or a lost race; safe to retry.
  Conflict,
  Forbidden,
  Storage,
}

impl ErrorKind {
  pub fn is_retryable(self) -> bool { matches!(self, Self::Conflict) }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("case not found: {0}")]
  CaseNotFound(CaseNumber),

  #[error("taxonomy node not found: {0}")]
  TaxonomyNodeNotFound(NodePath),

  #[error("taxonomy node {0} is referenced by at least one case")]
  TaxonomyInUse(NodePath),

  #[error("no active assignment of {person_id} to case {case_number} in term {term}")]
  AssignmentNotFound {
    case_number: CaseNumber,
    person_id:   String,
    term:        String,
  },

  #[error("unknown status code: {0:?}")]
  UnknownStatus(String),

  #[error("operation requires elevated privilege: {0}")]
  Forbidden(String),
}

impl Error {
  /// Shorthand for a [`Error::Validation`] naming the failing field.
  pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Validation { field: field.into(), reason: reason.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation { .. } | Self::TaxonomyInUse(_) | Self::UnknownStatus(_) => {
        ErrorKind::Validation
      }
      Self::CaseNotFound(_)
      | Self::TaxonomyNodeNotFound(_)
      | Self::AssignmentNotFound { .. } => ErrorKind::NotFound,
      Self::Forbidden(_) => ErrorKind::Forbidden,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
