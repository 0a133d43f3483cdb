//! Handlers for `/people` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/people/available` | `?role=student\|supervisor&term=…` |
//! | `POST` | `/people/import` | `?role&term`; body: array of rows; returns the per-row report |
//! | `GET`  | `/people/{id}` | Identity plus every participation |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use clinic_core::{
  person::{AvailablePerson, Identity, Participation, Role},
  reconcile::{ImportRow, ReconcileReport},
  store::ClinicStore,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RoleTerm {
  pub role: Role,
  pub term: String,
}

/// `GET /people/available?role=…&term=…`
pub async fn available<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<RoleTerm>,
) -> Result<Json<Vec<AvailablePerson>>, ApiError> {
  let people = store
    .list_available_people(params.role, params.term)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(people))
}

/// `POST /people/import?role=…&term=…`
///
/// Row errors are reported in the body with a 200; only an unknown term or a
/// store failure fails the request.
pub async fn import<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<RoleTerm>,
  Json(rows): Json<Vec<ImportRow>>,
) -> Result<Json<ReconcileReport>, ApiError> {
  let report = store
    .reconcile(rows, params.role, params.term)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct PersonView {
  pub identity:       Identity,
  pub participations: Vec<Participation>,
}

/// `GET /people/{id}`
pub async fn get_one<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<PersonView>, ApiError> {
  let identity = store
    .get_identity(id.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id}")))?;
  let participations = store
    .list_participations(identity.id.clone())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(PersonView { identity, participations }))
}
