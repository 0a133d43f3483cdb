//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use clinic_core::{ErrorKind, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// No caller identity header on a call that needs one.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("{source}")]
  Store {
    kind:   ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  /// Wrap a backend error, keeping its [`ErrorKind`] for the status code.
  pub fn store<E: StoreError>(e: E) -> Self {
    Self::Store { kind: e.kind(), source: Box::new(e) }
  }
}

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
    ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Store { kind, .. } => status_for(*kind),
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
