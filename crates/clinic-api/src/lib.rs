//! JSON REST API for the legal-clinic case store.
//!
//! Exposes an axum [`Router`] backed by any [`clinic_core::store::ClinicStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility; the
//! caller identity arrives in headers (see [`actor`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", clinic_api::api_router(store.clone()))
//! ```

pub mod actor;
pub mod assignments;
pub mod cases;
pub mod error;
pub mod people;
pub mod status;
pub mod taxonomy;
pub mod terms;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use clinic_core::store::ClinicStore;

pub use error::ApiError;

const SUBJECT: &str = "/taxonomy/subjects/{s}";
const CATEGORY: &str = "/taxonomy/subjects/{s}/categories/{c}";
const SUBCATEGORY: &str = "/taxonomy/subjects/{s}/categories/{c}/subcategories/{sc}";
const SCOPE: &str = "/taxonomy/subjects/{s}/categories/{c}/subcategories/{sc}/scopes/{n}";

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ClinicStore + 'static,
{
  Router::new()
    // Terms
    .route("/terms", get(terms::list::<S>))
    .route("/terms/{code}", put(terms::upsert::<S>))
    // Taxonomy
    .route(
      "/taxonomy/subjects",
      get(taxonomy::list_subjects::<S>).post(taxonomy::create_subject::<S>),
    )
    .route(
      SUBJECT,
      patch(taxonomy::rename_subject::<S>).delete(taxonomy::delete_subject::<S>),
    )
    .route(
      &format!("{SUBJECT}/categories"),
      get(taxonomy::list_categories::<S>).post(taxonomy::create_category::<S>),
    )
    .route(
      CATEGORY,
      patch(taxonomy::rename_category::<S>)
        .delete(taxonomy::delete_category::<S>),
    )
    .route(
      &format!("{CATEGORY}/subcategories"),
      get(taxonomy::list_subcategories::<S>).post(taxonomy::create_subcategory::<S>),
    )
    .route(
      SUBCATEGORY,
      patch(taxonomy::rename_subcategory::<S>)
        .delete(taxonomy::delete_subcategory::<S>),
    )
    .route(
      &format!("{SUBCATEGORY}/scopes"),
      get(taxonomy::list_legal_scopes::<S>).post(taxonomy::create_legal_scope::<S>),
    )
    .route(
      SCOPE,
      get(taxonomy::resolve_legal_scope::<S>)
        .patch(taxonomy::rename_legal_scope::<S>)
        .delete(taxonomy::delete_legal_scope::<S>),
    )
    // Cases
    .route("/cases", get(cases::list::<S>).post(cases::create::<S>))
    .route(
      "/cases/{n}",
      get(cases::get_one::<S>)
        .patch(cases::update::<S>)
        .delete(cases::delete::<S>),
    )
    .route("/cases/{n}/supports", post(cases::add_support::<S>))
    // Status ledger
    .route("/cases/{n}/status", get(status::current::<S>).post(status::change::<S>))
    .route("/cases/{n}/status/history", get(status::history::<S>))
    // Assignments
    .route("/cases/{n}/assignments", get(assignments::list::<S>))
    .route("/cases/{n}/assignments/students", post(assignments::assign_student::<S>))
    .route("/cases/{n}/assignments/supervisor", post(assignments::assign_supervisor::<S>))
    .route("/cases/{n}/assignments/release", post(assignments::release::<S>))
    // People
    .route("/people/available", get(people::available::<S>))
    .route("/people/import", post(people::import::<S>))
    .route("/people/{id}", get(people::get_one::<S>))
    .with_state(store)
}
