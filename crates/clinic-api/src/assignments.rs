//! Handlers for `/cases/{n}/assignments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases/{n}/assignments` | `?include_inactive=true` adds superseded rows |
//! | `POST` | `/cases/{n}/assignments/students` | Body: [`AssignBody`] |
//! | `POST` | `/cases/{n}/assignments/supervisor` | Body: [`AssignBody`]; replaces the active supervisor |
//! | `POST` | `/cases/{n}/assignments/release` | Body: [`AssignBody`] |
//!
//! Assign calls answer 201 when a row was written and 200 when the person
//! was already assigned.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use clinic_core::{
  assignment::{Assignment, AssignmentOutcome},
  case::CaseNumber,
  store::ClinicStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub include_inactive: bool,
}

/// `GET /cases/{n}/assignments[?include_inactive=true]`
pub async fn list<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
  let assignments = store
    .list_assignments(case_number, params.include_inactive)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignments))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub person_id: String,
  pub term:      String,
}

fn respond(outcome: AssignmentOutcome) -> impl IntoResponse {
  let status = match outcome {
    AssignmentOutcome::Unchanged { .. } => StatusCode::OK,
    AssignmentOutcome::Created { .. } | AssignmentOutcome::Superseded { .. } => {
      StatusCode::CREATED
    }
  };
  (status, Json(outcome))
}

/// `POST /cases/{n}/assignments/students`
pub async fn assign_student<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = store
    .assign_student(case_number, body.person_id, body.term)
    .await
    .map_err(ApiError::store)?;
  Ok(respond(outcome))
}

/// `POST /cases/{n}/assignments/supervisor`
pub async fn assign_supervisor<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = store
    .assign_supervisor(case_number, body.person_id, body.term)
    .await
    .map_err(ApiError::store)?;
  Ok(respond(outcome))
}

/// `POST /cases/{n}/assignments/release`
pub async fn release<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(case_number): Path<CaseNumber>,
  Json(body): Json<AssignBody>,
) -> Result<Json<Assignment>, ApiError> {
  let released = store
    .release_assignment(case_number, body.person_id, body.term)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(released))
}
