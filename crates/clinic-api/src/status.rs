//! Handlers for `/cases/{n}/status` endpoints.
//!
//! The ledger is append-only, so there is no `PUT` or `DELETE` here.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use clinic_core::{
  case::CaseNumber,
  status::{StatusChange, StatusEntry, StatusLedger},
  store::ClinicStore,
};

use crate::error::ApiError;

/// `GET /cases/{n}/status`
pub async fn current<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
) -> Result<Json<StatusEntry>, ApiError> {
  let entry = store
    .current_status(case_number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("case {case_number}")))?;
  Ok(Json(entry))
}

/// `POST /cases/{n}/status` — body: `{"status":"archived","reason":"…","acting_person":"V-123"}`
pub async fn change<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(body): Json<StatusChange>,
) -> Result<impl IntoResponse, ApiError> {
  let entry = store
    .change_status(case_number, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /cases/{n}/status/history` — oldest first. An unknown case has an
/// empty history.
pub async fn history<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
) -> Result<Json<StatusLedger>, ApiError> {
  Ok(Json(store.status_history(case_number).await.map_err(ApiError::store)?))
}
