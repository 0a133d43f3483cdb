//! Handlers for `/terms` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/terms` | Most recent first |
//! | `PUT`  | `/terms/{code}` | Body: `{"starts_on":"2025-09-01","ends_on":"2026-01-31"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::NaiveDate;
use clinic_core::{person::Term, store::ClinicStore};
use serde::Deserialize;

use crate::error::ApiError;

/// `GET /terms`
pub async fn list<S: ClinicStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Term>>, ApiError> {
  let terms = store.list_terms().await.map_err(ApiError::store)?;
  Ok(Json(terms))
}

#[derive(Debug, Deserialize)]
pub struct TermBody {
  pub starts_on: NaiveDate,
  pub ends_on:   NaiveDate,
}

/// `PUT /terms/{code}`
pub async fn upsert<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(code): Path<String>,
  Json(body): Json<TermBody>,
) -> Result<Json<Term>, ApiError> {
  let term = store
    .upsert_term(Term { code, starts_on: body.starts_on, ends_on: body.ends_on })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(term))
}
