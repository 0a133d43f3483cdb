//! The `ClinicStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `clinic-store-sqlite`).
//! Higher layers (`clinic-api`, `clinic-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  ErrorKind,
  assignment::{Assignment, AssignmentOutcome},
  case::{Case, CaseDetail, CaseFilter, CaseNumber, CasePatch, LegalSupport, NewCase, NewSupport},
  person::{Actor, AvailablePerson, Identity, Participation, Role, Term},
  reconcile::{ImportRow, ReconcileReport},
  status::{StatusChange, StatusEntry, StatusLedger},
  taxonomy::{
    Category, CategoryPath, LegalScope, LegalScopePath, NodePath, ResolvedLegalScope,
    Subcategory, SubcategoryPath, Subject, SubjectId,
  },
};

/// Implemented by every backend error so callers can react to the failure
/// category without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;

  fn is_retryable(&self) -> bool { self.kind().is_retryable() }
}

impl StoreError for crate::Error {
  fn kind(&self) -> ErrorKind { crate::Error::kind(self) }
}

/// Abstraction over a clinic store backend.
///
/// Every write is one transaction: it either commits entirely or leaves no
/// trace. Reads always go to the backend; nothing is cached between calls.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ClinicStore: Send + Sync {
  type Error: StoreError;

  // ── Term catalog ──────────────────────────────────────────────────────

  /// Insert a term or update its dates.
  fn upsert_term(
    &self,
    term: Term,
  ) -> impl Future<Output = Result<Term, Self::Error>> + Send + '_;

  /// All terms, most recent start first.
  fn list_terms(&self) -> impl Future<Output = Result<Vec<Term>, Self::Error>> + Send + '_;

  // ── Taxonomy ──────────────────────────────────────────────────────────

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Empty when the subject does not exist.
  fn list_categories(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  /// Empty when any part of `parent` does not exist.
  fn list_subcategories(
    &self,
    parent: CategoryPath,
  ) -> impl Future<Output = Result<Vec<Subcategory>, Self::Error>> + Send + '_;

  /// Empty when any part of `parent` does not exist.
  fn list_legal_scopes(
    &self,
    parent: SubcategoryPath,
  ) -> impl Future<Output = Result<Vec<LegalScope>, Self::Error>> + Send + '_;

  fn create_subject(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Takes the next number within the subject. Fails with `NotFound` when
  /// the subject does not exist.
  fn create_category(
    &self,
    subject_id: SubjectId,
    name: String,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  fn create_subcategory(
    &self,
    parent: CategoryPath,
    name: String,
  ) -> impl Future<Output = Result<Subcategory, Self::Error>> + Send + '_;

  fn create_legal_scope(
    &self,
    parent: SubcategoryPath,
    name: String,
  ) -> impl Future<Output = Result<LegalScope, Self::Error>> + Send + '_;

  /// Change a node's name. Its number never changes.
  fn rename_node(
    &self,
    path: NodePath,
    name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a node and its subtree. Refused while any case is filed below it.
  fn delete_node(
    &self,
    path: NodePath,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a leaf with all its ancestor names; `None` if the path is
  /// broken at any level.
  fn resolve_legal_scope(
    &self,
    path: LegalScopePath,
  ) -> impl Future<Output = Result<Option<ResolvedLegalScope>, Self::Error>> + Send + '_;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Open a case with its beneficiaries, first status entry, optional
  /// assignments and supports in one transaction. Returns the new case
  /// number.
  fn create_case(
    &self,
    input: NewCase,
  ) -> impl Future<Output = Result<CaseNumber, Self::Error>> + Send + '_;

  /// Apply a partial update to the case header. Status and assignments are
  /// not touched.
  fn update_case(
    &self,
    case_number: CaseNumber,
    patch: CasePatch,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  fn get_case(
    &self,
    case_number: CaseNumber,
  ) -> impl Future<Output = Result<Option<CaseDetail>, Self::Error>> + Send + '_;

  fn list_cases(
    &self,
    filter: CaseFilter,
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + '_;

  /// Attach a document that was uploaded after the case was opened.
  fn add_support(
    &self,
    case_number: CaseNumber,
    support: NewSupport,
  ) -> impl Future<Output = Result<LegalSupport, Self::Error>> + Send + '_;

  /// Irreversibly delete a case and everything that belongs to it.
  /// `actor` must hold elevated privilege.
  fn delete_case(
    &self,
    case_number: CaseNumber,
    actor: Actor,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Status ledger ─────────────────────────────────────────────────────

  /// Append a status entry with the next sequence number.
  fn change_status(
    &self,
    case_number: CaseNumber,
    change: StatusChange,
  ) -> impl Future<Output = Result<StatusEntry, Self::Error>> + Send + '_;

  /// Full history, oldest first. Empty for an unknown case.
  fn status_history(
    &self,
    case_number: CaseNumber,
  ) -> impl Future<Output = Result<StatusLedger, Self::Error>> + Send + '_;

  /// The entry with the greatest sequence.
  fn current_status(
    &self,
    case_number: CaseNumber,
  ) -> impl Future<Output = Result<Option<StatusEntry>, Self::Error>> + Send + '_;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Additive; assigning an already active student is a no-op.
  fn assign_student(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> impl Future<Output = Result<AssignmentOutcome, Self::Error>> + Send + '_;

  /// Supersedes the active supervisor of the case for that term, if any.
  fn assign_supervisor(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> impl Future<Output = Result<AssignmentOutcome, Self::Error>> + Send + '_;

  /// Deactivate an active assignment without a replacement.
  fn release_assignment(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  fn active_assignments(
    &self,
    case_number: CaseNumber,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Assignments of a case in assignment order; superseded and released rows
  /// are included when `include_inactive` is set.
  fn list_assignments(
    &self,
    case_number: CaseNumber,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// People holding a participation in `term` whose identity has `role`.
  fn list_available_people(
    &self,
    role: Role,
    term: String,
  ) -> impl Future<Output = Result<Vec<AvailablePerson>, Self::Error>> + Send + '_;

  // ── Bulk identity import ──────────────────────────────────────────────

  /// Create or link identities and their participation in `term`. Bad rows
  /// are reported, never raised; only whole-call failures are errors.
  fn reconcile(
    &self,
    rows: Vec<ImportRow>,
    role: Role,
    term: String,
  ) -> impl Future<Output = Result<ReconcileReport, Self::Error>> + Send + '_;

  fn get_identity(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn list_participations(
    &self,
    identity_id: String,
  ) -> impl Future<Output = Result<Vec<Participation>, Self::Error>> + Send + '_;
}
