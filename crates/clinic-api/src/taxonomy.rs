//! Handlers for `/taxonomy` endpoints.
//!
//! Paths nest one segment per level: `{s}` is the subject id and `{c}`,
//! `{sc}`, `{n}` are the locally-scoped numbers of the category, subcategory
//! and legal scope. Listing under a parent that does not exist returns `[]`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`/`POST` | `/taxonomy/subjects` | Body: `{"name":"..."}` |
//! | `PATCH`/`DELETE` | `/taxonomy/subjects/{s}` | Rename / delete subtree |
//! | `GET`/`POST` | `…/{s}/categories` | |
//! | `PATCH`/`DELETE` | `…/{s}/categories/{c}` | |
//! | `GET`/`POST` | `…/{c}/subcategories` | |
//! | `PATCH`/`DELETE` | `…/{c}/subcategories/{sc}` | |
//! | `GET`/`POST` | `…/{sc}/scopes` | |
//! | `GET`/`PATCH`/`DELETE` | `…/{sc}/scopes/{n}` | `GET` resolves the full path |
//!
//! Deleting a node that any case still references answers 422.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use clinic_core::{
  store::ClinicStore,
  taxonomy::{
    Category, CategoryPath, LegalScope, LegalScopePath, LocalNumber, NodePath,
    ResolvedLegalScope, Subcategory, SubcategoryPath, Subject, SubjectId,
  },
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct NameBody {
  pub name: String,
}

fn category_path((subject_id, category): (SubjectId, LocalNumber)) -> CategoryPath {
  CategoryPath { subject_id, category }
}

fn subcategory_path(
  (subject_id, category, subcategory): (SubjectId, LocalNumber, LocalNumber),
) -> SubcategoryPath {
  SubcategoryPath { subject_id, category, subcategory }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

/// `GET /taxonomy/subjects`
pub async fn list_subjects<S: ClinicStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Subject>>, ApiError> {
  Ok(Json(store.list_subjects().await.map_err(ApiError::store)?))
}

/// `POST /taxonomy/subjects`
pub async fn create_subject<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let subject = store.create_subject(body.name).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /taxonomy/subjects/{s}/categories`
pub async fn list_categories<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(subject_id): Path<SubjectId>,
) -> Result<Json<Vec<Category>>, ApiError> {
  Ok(Json(store.list_categories(subject_id).await.map_err(ApiError::store)?))
}

/// `POST /taxonomy/subjects/{s}/categories`
pub async fn create_category<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(subject_id): Path<SubjectId>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let category = store
    .create_category(subject_id, body.name)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(category)))
}

// ─── Subcategories ───────────────────────────────────────────────────────────

pub async fn list_subcategories<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(parent): Path<(SubjectId, LocalNumber)>,
) -> Result<Json<Vec<Subcategory>>, ApiError> {
  let subcategories = store
    .list_subcategories(category_path(parent))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(subcategories))
}

pub async fn create_subcategory<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(parent): Path<(SubjectId, LocalNumber)>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let subcategory = store
    .create_subcategory(category_path(parent), body.name)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(subcategory)))
}

// ─── Legal scopes ────────────────────────────────────────────────────────────

pub async fn list_legal_scopes<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(parent): Path<(SubjectId, LocalNumber, LocalNumber)>,
) -> Result<Json<Vec<LegalScope>>, ApiError> {
  let scopes = store
    .list_legal_scopes(subcategory_path(parent))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(scopes))
}

pub async fn create_legal_scope<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(parent): Path<(SubjectId, LocalNumber, LocalNumber)>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let scope = store
    .create_legal_scope(subcategory_path(parent), body.name)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(scope)))
}

/// `GET …/scopes/{n}` — names of every level on the path.
pub async fn resolve_legal_scope<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path((subject_id, category, subcategory, scope)): Path<(
    SubjectId,
    LocalNumber,
    LocalNumber,
    LocalNumber,
  )>,
) -> Result<Json<ResolvedLegalScope>, ApiError> {
  let path = LegalScopePath::new(subject_id, category, subcategory, scope);
  let resolved = store
    .resolve_legal_scope(path)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("legal scope {}", NodePath::from(path))))?;
  Ok(Json(resolved))
}

// ─── Rename / delete ─────────────────────────────────────────────────────────

async fn rename<S: ClinicStore>(store: &S, path: NodePath, name: String) -> Result<StatusCode, ApiError> {
  store.rename_node(path, name).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

async fn delete<S: ClinicStore>(store: &S, path: NodePath) -> Result<StatusCode, ApiError> {
  store.delete_node(path).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn rename_subject<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(subject_id): Path<SubjectId>,
  Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
  rename(&*store, NodePath::Subject { subject_id }, body.name).await
}

pub async fn delete_subject<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(subject_id): Path<SubjectId>,
) -> Result<StatusCode, ApiError> {
  delete(&*store, NodePath::Subject { subject_id }).await
}

pub async fn rename_category<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<(SubjectId, LocalNumber)>,
  Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
  rename(&*store, category_path(key).into(), body.name).await
}

pub async fn delete_category<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<(SubjectId, LocalNumber)>,
) -> Result<StatusCode, ApiError> {
  delete(&*store, category_path(key).into()).await
}

pub async fn rename_subcategory<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<(SubjectId, LocalNumber, LocalNumber)>,
  Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
  rename(&*store, subcategory_path(key).into(), body.name).await
}

pub async fn delete_subcategory<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<(SubjectId, LocalNumber, LocalNumber)>,
) -> Result<StatusCode, ApiError> {
  delete(&*store, subcategory_path(key).into()).await
}

pub async fn rename_legal_scope<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path((s, c, sc, n)): Path<(SubjectId, LocalNumber, LocalNumber, LocalNumber)>,
  Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
  rename(&*store, LegalScopePath::new(s, c, sc, n).into(), body.name).await
}

pub async fn delete_legal_scope<S: ClinicStore>(
  State(store): State<Arc<S>>,
  Path((s, c, sc, n)): Path<(SubjectId, LocalNumber, LocalNumber, LocalNumber)>,
) -> Result<StatusCode, ApiError> {
  delete(&*store, LegalScopePath::new(s, c, sc, n).into()).await
}
