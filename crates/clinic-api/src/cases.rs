//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases` | Optional `?term`, `?status`, `?limit`, `?offset` |
//! | `POST` | `/cases` | Body: [`NewCase`]; 201 + `{"case_number":…}` |
//! | `GET`  | `/cases/{n}` | Header, classification, beneficiaries, supports, current status |
//! | `PATCH`| `/cases/{n}` | Body: [`CasePatch`] |
//! | `DELETE` | `/cases/{n}` | Needs an elevated caller; removes every dependent row |
//! | `POST` | `/cases/{n}/supports` | Body: [`NewSupport`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use clinic_core::{
  case::{Case, CaseDetail, CaseFilter, CaseNumber, CasePatch, NewCase, NewSupport},
  store::ClinicStore,
};
use serde::Serialize;

use crate::{actor::Caller, error::ApiError};

/// `GET /cases[?term=…][&status=…][&limit=…][&offset=…]`
pub async fn list<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Query(filter): Query<CaseFilter>,
) -> Result<Json<Vec<Case>>, ApiError> {
  Ok(Json(store.list_cases(filter).await.map_err(ApiError::store)?))
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub case_number: CaseNumber,
}

/// `POST /cases`
pub async fn create<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewCase>,
) -> Result<impl IntoResponse, ApiError> {
  let case_number = store.create_case(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(Created { case_number })))
}

/// `GET /cases/{n}`
pub async fn get_one<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
) -> Result<Json<CaseDetail>, ApiError> {
  let detail = store
    .get_case(case_number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("case {case_number}")))?;
  Ok(Json(detail))
}

/// `PATCH /cases/{n}`
pub async fn update<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(patch): Json<CasePatch>,
) -> Result<Json<Case>, ApiError> {
  let case = store
    .update_case(case_number, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(case))
}

/// `DELETE /cases/{n}` — irreversible.
pub async fn delete<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Caller(actor): Caller,
) -> Result<StatusCode, ApiError> {
  store
    .delete_case(case_number, actor)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /cases/{n}/supports`
pub async fn add_support<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(body): Json<NewSupport>,
) -> Result<impl IntoResponse, ApiError> {
  let support = store
    .add_support(case_number, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(support)))
}
