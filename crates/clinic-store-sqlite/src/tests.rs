//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use clinic_core::{
  Error as CoreError, ErrorKind,
  assignment::{AssignmentOutcome, AssignmentRequest},
  case::{CaseFilter, CasePatch, NewBeneficiary, NewCase, NewSupport},
  person::{Actor, ParticipationKind, Privilege, Role, Term},
  reconcile::{ImportRow, RowStatus},
  status::{CaseStatus, StatusChange},
  store::{ClinicStore, StoreError as _},
  taxonomy::{CategoryPath, LegalScopePath, NodePath, SubcategoryPath},
};

use rusqlite::params;

use crate::{SqliteStore, StoreOptions, error::Error};

const TERM: &str = "2025-15";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn validation_field(err: &Error) -> Option<&str> {
  match err {
    Error::Core(CoreError::Validation { field, .. }) => Some(field),
    _ => None,
  }
}

async fn add_term(s: &SqliteStore, code: &str) {
  s.upsert_term(Term {
    code:      code.into(),
    starts_on: date(2025, 9, 1),
    ends_on:   date(2026, 1, 31),
  })
  .await
  .unwrap();
}

/// A term plus one complete subject → category → subcategory → scope path.
async fn seeded() -> (SqliteStore, LegalScopePath) {
  let s = SqliteStore::open_in_memory_with(StoreOptions {
    first_case_number: 1001,
    ..StoreOptions::default()
  })
  .await
  .unwrap();
  add_term(&s, TERM).await;
  let scope = add_scope(&s).await;
  (s, scope)
}

async fn add_scope(s: &SqliteStore) -> LegalScopePath {
  let subject = s.create_subject("Civil".into()).await.unwrap();
  let category = s.create_category(subject.id, "Family".into()).await.unwrap();
  let subcategory = s
    .create_subcategory(category.path(), "Custody".into())
    .await
    .unwrap();
  s.create_legal_scope(subcategory.path(), "Shared custody".into())
    .await
    .unwrap()
    .path()
}

fn person_row(id: &str, last: &str, first: &str) -> ImportRow {
  ImportRow {
    id: Some(id.into()),
    name: Some(format!("{last}, {first}")),
    email: Some(format!("{}@clinic.test", first.to_lowercase())),
    ..ImportRow::default()
  }
}

/// Two students and two supervisors participating in [`TERM`].
async fn enrol_people(s: &SqliteStore) {
  let students = vec![
    person_row("V-1001", "Pérez", "Ana"),
    person_row("V-1002", "Gómez", "Luis"),
  ];
  let supervisors = vec![
    person_row("V-2001", "Rivas", "Carmen"),
    person_row("V-2002", "Mora", "José"),
  ];
  let report = s.reconcile(students, Role::Student, TERM.into()).await.unwrap();
  assert_eq!(report.created, 2);
  let report = s.reconcile(supervisors, Role::Supervisor, TERM.into()).await.unwrap();
  assert_eq!(report.created, 2);
}

fn new_case(scope: LegalScopePath) -> NewCase {
  NewCase {
    applicant_id:      "V-5555".into(),
    legal_scope:       scope,
    facility_id:       1,
    procedure_type_id: 2,
    synopsis:          "Custody arrangement after separation".into(),
    start_date:        date(2025, 10, 1),
    end_date:          None,
    term:              TERM.into(),
    initial_status:    CaseStatus::InProgress,
    status_reason:     None,
    opened_by:         "V-2001".into(),
    beneficiaries:     vec![NewBeneficiary::applicant("V-5555", "María", "López")],
    assignment:        None,
    supports:          Vec::new(),
  }
}

fn change(status: CaseStatus, reason: &str) -> StatusChange {
  StatusChange::new(status, reason, "V-2001")
}

// ─── Taxonomy ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn child_numbers_are_scoped_to_their_parent() {
  let s = store().await;
  let civil = s.create_subject("Civil".into()).await.unwrap();
  let labour = s.create_subject("Labour".into()).await.unwrap();

  let family = s.create_category(civil.id, "Family".into()).await.unwrap();
  let estates = s.create_category(civil.id, "Estates".into()).await.unwrap();
  let dismissal = s.create_category(labour.id, "Dismissal".into()).await.unwrap();
  assert_eq!((family.number, estates.number, dismissal.number), (1, 2, 1));

  let custody = s.create_subcategory(family.path(), "Custody".into()).await.unwrap();
  let wills = s.create_subcategory(estates.path(), "Wills".into()).await.unwrap();
  assert_eq!((custody.number, wills.number), (1, 1));

  let scope = s.create_legal_scope(custody.path(), "Shared".into()).await.unwrap();
  assert_eq!(NodePath::from(scope.path()).to_string(), format!("{}.1.1.1", civil.id));

  let categories = s.list_categories(civil.id).await.unwrap();
  assert_eq!(categories.len(), 2);
  assert!(categories.iter().all(|c| c.subject_id == civil.id));
}

#[tokio::test]
async fn listing_under_missing_parent_is_empty() {
  let s = store().await;
  assert!(s.list_categories(42).await.unwrap().is_empty());
  assert!(
    s.list_subcategories(CategoryPath { subject_id: 42, category: 1 })
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.list_legal_scopes(SubcategoryPath { subject_id: 42, category: 1, subcategory: 1 })
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn create_under_missing_parent_is_not_found() {
  let s = store().await;
  let err = s.create_category(7, "Orphan".into()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::TaxonomyNodeNotFound(NodePath::Subject { subject_id: 7 }))
  ));
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleted_numbers_are_never_reused() {
  let s = store().await;
  let subject = s.create_subject("Civil".into()).await.unwrap();
  s.create_category(subject.id, "One".into()).await.unwrap();
  let two = s.create_category(subject.id, "Two".into()).await.unwrap();

  s.delete_node(two.path().into()).await.unwrap();
  let three = s.create_category(subject.id, "Three".into()).await.unwrap();
  assert_eq!(three.number, 3);
}

#[tokio::test]
async fn blank_node_name_is_rejected() {
  let s = store().await;
  let err = s.create_subject("   ".into()).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("name"));
}

#[tokio::test]
async fn rename_and_resolve() {
  let (s, scope) = seeded().await;
  s.rename_node(scope.parent().into(), "Parental authority".into())
    .await
    .unwrap();

  let resolved = s.resolve_legal_scope(scope).await.unwrap().unwrap();
  assert_eq!(resolved.subject, "Civil");
  assert_eq!(resolved.category, "Family");
  assert_eq!(resolved.subcategory, "Parental authority");
  assert_eq!(resolved.legal_scope, "Shared custody");

  let missing = LegalScopePath { scope: 99, ..scope };
  assert!(s.resolve_legal_scope(missing).await.unwrap().is_none());
  let err = s.rename_node(missing.into(), "Nope".into()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn referenced_nodes_cannot_be_deleted() {
  let (s, scope) = seeded().await;
  s.create_case(new_case(scope)).await.unwrap();

  let err = s.delete_node(scope.into()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::TaxonomyInUse(_))));

  // Cascading from the top is refused as well.
  let err = s
    .delete_node(NodePath::Subject { subject_id: scope.subject_id })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::TaxonomyInUse(_))));
  assert!(s.resolve_legal_scope(scope).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_subject_removes_its_subtree() {
  let s = store().await;
  let scope = add_scope(&s).await;
  s.delete_node(NodePath::Subject { subject_id: scope.subject_id })
    .await
    .unwrap();

  assert!(s.list_subjects().await.unwrap().is_empty());
  assert!(s.list_categories(scope.subject_id).await.unwrap().is_empty());
  assert!(s.resolve_legal_scope(scope).await.unwrap().is_none());
}

// ─── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_case_records_initial_status() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();
  assert_eq!(case_number, 1001);

  let detail = s.get_case(case_number).await.unwrap().unwrap();
  assert_eq!(detail.case.legal_scope, scope);
  assert_eq!(detail.classification.legal_scope, "Shared custody");
  assert_eq!(detail.beneficiaries.len(), 1);
  assert_eq!(detail.beneficiaries[0].identity_number, "V-5555");

  let current = detail.current_status.unwrap();
  assert_eq!(current.sequence, 1);
  assert_eq!(current.status, CaseStatus::InProgress);
  assert_eq!(current.reason, "case opened");

  assert_eq!(s.create_case(new_case(scope)).await.unwrap(), 1002);
}

#[tokio::test]
async fn create_case_normalizes_applicant_id() {
  let (s, scope) = seeded().await;
  let mut input = new_case(scope);
  input.applicant_id = " v5555 ".into();
  let case_number = s.create_case(input).await.unwrap();
  let detail = s.get_case(case_number).await.unwrap().unwrap();
  assert_eq!(detail.case.applicant_id, "V-5555");

  let mut input = new_case(scope);
  input.applicant_id = "nobody".into();
  let err = s.create_case(input).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("applicant_id"));
}

#[tokio::test]
async fn create_case_with_missing_beneficiary_field_writes_nothing() {
  let (s, scope) = seeded().await;
  let mut input = new_case(scope);
  input.beneficiaries[0].kind = None;

  let err = s.create_case(input).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("beneficiaries[0].kind"));
  assert!(s.list_cases(CaseFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_case_rolls_back_when_assignee_unavailable() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;

  let mut input = new_case(scope);
  input.assignment = Some(AssignmentRequest {
    term:       TERM.into(),
    students:   vec!["V-1001".into(), "V-7777".into()],
    supervisor: Some("V-2001".into()),
  });

  let err = s.create_case(input).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("assignment.students[1]"));
  assert!(s.list_cases(CaseFilter::default()).await.unwrap().is_empty());
  assert!(s.get_case(1001).await.unwrap().is_none());
  assert!(s.status_history(1001).await.unwrap().is_empty());
  assert!(s.list_assignments(1001, true).await.unwrap().is_empty());

  // The failed attempt did not consume a case number.
  assert_eq!(s.create_case(new_case(scope)).await.unwrap(), 1001);
}

#[tokio::test]
async fn create_case_with_full_staffing_and_supports() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;

  let mut input = new_case(scope);
  input.assignment = Some(AssignmentRequest {
    term:       TERM.into(),
    students:   vec!["V-1001".into(), "v-1.002".into()],
    supervisor: Some("V-2001".into()),
  });
  input.supports = vec![NewSupport {
    description:  "Birth certificate".into(),
    document_url: "https://docs.clinic.test/birth.pdf".into(),
    observation:  None,
  }];

  let case_number = s.create_case(input).await.unwrap();
  let active = s.active_assignments(case_number).await.unwrap();
  assert_eq!(active.len(), 3);
  assert!(active.iter().any(|a| a.person_id == "V-1002" && a.role == Role::Student));
  assert_eq!(active.iter().filter(|a| a.role == Role::Supervisor).count(), 1);

  let detail = s.get_case(case_number).await.unwrap().unwrap();
  assert_eq!(detail.supports.len(), 1);
  assert_eq!(detail.supports[0].description, "Birth certificate");
}

#[tokio::test]
async fn create_case_rejects_unknown_term_and_scope() {
  let (s, scope) = seeded().await;

  let mut input = new_case(scope);
  input.term = "1999-01".into();
  let err = s.create_case(input).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("term"));

  let input = new_case(LegalScopePath { scope: 9, ..scope });
  let err = s.create_case(input).await.unwrap_err();
  assert_eq!(validation_field(&err), Some("legal_scope"));
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn update_case_applies_patch() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let updated = s
    .update_case(case_number, CasePatch {
      synopsis: Some("Revised synopsis".into()),
      end_date: Some(Some(date(2025, 12, 15))),
      ..CasePatch::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.synopsis, "Revised synopsis");
  assert_eq!(updated.end_date, Some(date(2025, 12, 15)));

  let stored = s.get_case(case_number).await.unwrap().unwrap().case;
  assert_eq!(stored, updated);
}

#[tokio::test]
async fn update_case_rejects_bad_scope_and_dates() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let err = s
    .update_case(case_number, CasePatch {
      legal_scope: Some(LegalScopePath { scope: 9, ..scope }),
      ..CasePatch::default()
    })
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("legal_scope"));

  let err = s
    .update_case(case_number, CasePatch {
      end_date: Some(Some(date(2025, 1, 1))),
      ..CasePatch::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = s.update_case(9999, CasePatch::default()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CaseNotFound(9999))));
}

#[tokio::test]
async fn add_support_checks_url() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let err = s
    .add_support(case_number, NewSupport {
      description:  "Lease".into(),
      document_url: "not a url".into(),
      observation:  None,
    })
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("support.document_url"));

  let support = s
    .add_support(case_number, NewSupport {
      description:  "Lease".into(),
      document_url: "http://docs.clinic.test/lease.pdf".into(),
      observation:  Some("  signed copy ".into()),
    })
    .await
    .unwrap();
  assert_eq!(support.observation.as_deref(), Some("signed copy"));

  let err = s
    .add_support(9999, NewSupport {
      description:  "Lease".into(),
      document_url: "http://docs.clinic.test/lease.pdf".into(),
      observation:  None,
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn list_cases_filters_by_current_status() {
  let (s, scope) = seeded().await;
  let first = s.create_case(new_case(scope)).await.unwrap();
  let second = s.create_case(new_case(scope)).await.unwrap();
  s.change_status(second, change(CaseStatus::Archived, "closed"))
    .await
    .unwrap();

  let in_progress = s
    .list_cases(CaseFilter { status: Some(CaseStatus::InProgress), ..CaseFilter::default() })
    .await
    .unwrap();
  assert_eq!(in_progress.iter().map(|c| c.case_number).collect::<Vec<_>>(), [first]);

  let page = s
    .list_cases(CaseFilter { limit: Some(1), offset: Some(1), ..CaseFilter::default() })
    .await
    .unwrap();
  assert_eq!(page.iter().map(|c| c.case_number).collect::<Vec<_>>(), [second]);

  let other_term = s
    .list_cases(CaseFilter { term: Some("2024-25".into()), ..CaseFilter::default() })
    .await
    .unwrap();
  assert!(other_term.is_empty());
}

#[tokio::test]
async fn delete_case_requires_elevated_privilege() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();
  s.assign_student(case_number, "V-1001".into(), TERM.into())
    .await
    .unwrap();

  let err = s
    .delete_case(case_number, Actor::new("V-1001", Privilege::Standard))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
  assert!(s.get_case(case_number).await.unwrap().is_some());

  s.delete_case(case_number, Actor::new("V-2001", Privilege::Elevated))
    .await
    .unwrap();
  assert!(s.get_case(case_number).await.unwrap().is_none());
  assert!(s.status_history(case_number).await.unwrap().is_empty());
  assert!(s.list_assignments(case_number, true).await.unwrap().is_empty());

  // The taxonomy leaf is free again.
  s.delete_node(scope.into()).await.unwrap();
}

// ─── Status ledger ───────────────────────────────────────────────────────────

#[tokio::test]
async fn status_history_is_ordered_and_append_only() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let advisory = s
    .change_status(case_number, change(CaseStatus::UnderAdvisory, "waiting on documents"))
    .await
    .unwrap();
  assert_eq!(advisory.sequence, 2);
  s.change_status(case_number, change(CaseStatus::Delivered, "ruling delivered"))
    .await
    .unwrap();

  let history = s.status_history(case_number).await.unwrap();
  let sequences: Vec<_> = history.iter().map(|e| e.sequence).collect();
  assert_eq!(sequences, [1, 2, 3]);
  assert_eq!(history.current_status(), Some(CaseStatus::Delivered));

  let current = s.current_status(case_number).await.unwrap().unwrap();
  assert_eq!(current.sequence, 3);
  assert_eq!(current.reason, "ruling delivered");

  let err = s
    .write(move |tx| {
      Ok(tx.execute(
        "UPDATE status_entries SET reason = 'edited' WHERE case_number = ?1",
        params![case_number],
      )?)
    })
    .await
    .unwrap_err();
  assert!(err.to_string().contains("append-only"), "{err}");

  let err = s
    .write(move |tx| {
      Ok(tx.execute("DELETE FROM status_entries WHERE case_number = ?1", params![case_number])?)
    })
    .await
    .unwrap_err();
  assert!(err.to_string().contains("append-only"), "{err}");

  let history = s.status_history(case_number).await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history.entries()[1].reason, "waiting on documents");

  // Entries still go with their case.
  s.delete_case(case_number, Actor::new("V-900", Privilege::Elevated))
    .await
    .unwrap();
  assert!(s.status_history(case_number).await.unwrap().is_empty());
}

#[tokio::test]
async fn change_status_validates_input() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let err = s
    .change_status(case_number, change(CaseStatus::Paused, "  "))
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("reason"));

  let err = s
    .change_status(9999, change(CaseStatus::Paused, "holiday"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CaseNotFound(9999))));
  assert_eq!(s.status_history(case_number).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_status_changes_get_contiguous_sequences() {
  let (s, scope) = seeded().await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let handles: Vec<_> = (0..10)
    .map(|i| {
      let s = s.clone();
      tokio::spawn(async move {
        s.change_status(case_number, change(CaseStatus::UnderAdvisory, &format!("review {i}")))
          .await
      })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let history = s.status_history(case_number).await.unwrap();
  let sequences: Vec<_> = history.iter().map(|e| e.sequence).collect();
  assert_eq!(sequences, (1..=11).collect::<Vec<_>>());
}

// ─── Assignments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_supervisor_supersedes_the_previous_one() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let first = s
    .assign_supervisor(case_number, "V-2001".into(), TERM.into())
    .await
    .unwrap();
  assert!(matches!(first, AssignmentOutcome::Created { .. }));

  let second = s
    .assign_supervisor(case_number, "V-2002".into(), TERM.into())
    .await
    .unwrap();
  let AssignmentOutcome::Superseded { assignment, previous } = second else {
    panic!("expected supersession");
  };
  assert_eq!(assignment.person_id, "V-2002");
  assert_eq!(previous.person_id, "V-2001");
  assert!(!previous.active);
  assert!(previous.released_at.is_some());

  let active = s.active_assignments(case_number).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].person_id, "V-2002");

  let all = s.list_assignments(case_number, true).await.unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn assigning_a_student_twice_is_a_no_op() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let first = s
    .assign_student(case_number, "V-1001".into(), TERM.into())
    .await
    .unwrap();
  assert!(matches!(first, AssignmentOutcome::Created { .. }));

  let again = s
    .assign_student(case_number, "v1001".into(), TERM.into())
    .await
    .unwrap();
  assert!(matches!(again, AssignmentOutcome::Unchanged { .. }));
  assert_eq!(s.list_assignments(case_number, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn assignment_requires_matching_role_and_participation() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  add_term(&s, "2026-01").await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let err = s
    .assign_student(case_number, "V-2001".into(), TERM.into())
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("person_id"));

  let err = s
    .assign_student(case_number, "V-1001".into(), "2026-01".into())
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("person_id"));

  let err = s
    .assign_student(case_number, "V-1001".into(), "1999-01".into())
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("term"));

  let err = s
    .assign_student(9999, "V-1001".into(), TERM.into())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn released_assignment_can_be_made_again() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  s.assign_student(case_number, "V-1002".into(), TERM.into())
    .await
    .unwrap();
  let released = s
    .release_assignment(case_number, "V-1002".into(), TERM.into())
    .await
    .unwrap();
  assert!(!released.active);
  assert!(s.active_assignments(case_number).await.unwrap().is_empty());

  let err = s
    .release_assignment(case_number, "V-1002".into(), TERM.into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AssignmentNotFound { .. })));

  let again = s
    .assign_student(case_number, "V-1002".into(), TERM.into())
    .await
    .unwrap();
  assert!(matches!(again, AssignmentOutcome::Created { .. }));
  assert_eq!(s.list_assignments(case_number, true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn assignment_terms_are_trimmed() {
  let (s, scope) = seeded().await;
  enrol_people(&s).await;
  let case_number = s.create_case(new_case(scope)).await.unwrap();

  let outcome = s
    .assign_supervisor(case_number, "V-2001".into(), format!(" {TERM} "))
    .await
    .unwrap();
  assert_eq!(outcome.assignment().term, TERM);
  let outcome = s
    .assign_student(case_number, "V-1001".into(), format!("{TERM}\t"))
    .await
    .unwrap();
  assert_eq!(outcome.assignment().term, TERM);

  let released = s
    .release_assignment(case_number, "V-1001".into(), format!(" {TERM}"))
    .await
    .unwrap();
  assert!(!released.active);
  assert_eq!(s.active_assignments(case_number).await.unwrap().len(), 1);
}

#[tokio::test]
async fn available_people_are_filtered_by_role_and_term() {
  let (s, _) = seeded().await;
  enrol_people(&s).await;

  let students = s.list_available_people(Role::Student, TERM.into()).await.unwrap();
  assert_eq!(students.len(), 2);
  assert!(students.iter().all(|p| p.identity.role == Role::Student));
  assert!(students.iter().all(|p| p.participation == ParticipationKind::Enrolled));

  let supervisors = s.list_available_people(Role::Supervisor, TERM.into()).await.unwrap();
  assert_eq!(supervisors.len(), 2);
  assert!(supervisors.iter().all(|p| p.participation == ParticipationKind::Titular));

  assert!(
    s.list_available_people(Role::Student, "2026-01".into())
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_reports_bad_rows_and_keeps_going() {
  let (s, _) = seeded().await;
  let mut bad = person_row("V-1002", "Gómez", "Luis");
  bad.email = Some("not-an-email".into());
  let rows = vec![
    person_row("V-1001", "Pérez", "Ana"),
    bad,
    person_row("V-1003", "Díaz", "Rosa"),
  ];

  let report = s.reconcile(rows.clone(), Role::Student, TERM.into()).await.unwrap();
  assert_eq!(report.created, 2);
  assert_eq!(report.updated, 0);
  assert_eq!(report.errors.len(), 1);
  assert_eq!(report.errors[0].row, 2);
  assert!(s.get_identity("V-1002".into()).await.unwrap().is_none());

  let ana = s.get_identity("1001".into()).await.unwrap().unwrap();
  assert_eq!(ana.first_names, "Ana");
  assert_eq!(ana.last_names, "Pérez");
  assert_eq!(ana.email, "ana@clinic.test");

  // Re-running the same sheet creates nothing new.
  let rerun = s.reconcile(rows, Role::Student, TERM.into()).await.unwrap();
  assert_eq!(rerun.created, 0);
  assert_eq!(rerun.updated, 2);
  assert_eq!(rerun.errors.len(), 1);
  assert_eq!(s.list_participations("V-1001".into()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reconcile_links_existing_identity_to_a_new_term() {
  let (s, _) = seeded().await;
  add_term(&s, "2026-01").await;
  let rows = vec![person_row("V-1001", "Pérez", "Ana")];

  s.reconcile(rows.clone(), Role::Student, TERM.into()).await.unwrap();
  let mut graduate = rows[0].clone();
  graduate.participation = Some(ParticipationKind::Graduate);
  let report = s
    .reconcile(vec![graduate], Role::Student, "2026-01".into())
    .await
    .unwrap();
  assert_eq!(report.updated, 1);
  assert_eq!(report.outcomes[0].status, RowStatus::Updated);

  let participations = s.list_participations("V-1001".into()).await.unwrap();
  assert_eq!(participations.len(), 2);
  assert!(
    participations
      .iter()
      .any(|p| p.term == "2026-01" && p.kind == ParticipationKind::Graduate)
  );
}

#[tokio::test]
async fn reconcile_rejects_role_mismatch_per_row() {
  let (s, _) = seeded().await;
  s.reconcile(vec![person_row("V-1001", "Pérez", "Ana")], Role::Student, TERM.into())
    .await
    .unwrap();

  let report = s
    .reconcile(
      vec![person_row("V-1001", "Pérez", "Ana"), person_row("V-2001", "Rivas", "Carmen")],
      Role::Supervisor,
      TERM.into(),
    )
    .await
    .unwrap();
  assert_eq!(report.created, 1);
  assert_eq!(report.errors.len(), 1);
  assert_eq!(report.errors[0].row, 1);
}

#[tokio::test]
async fn reconcile_with_unknown_term_fails_whole_call() {
  let s = store().await;
  let err = s
    .reconcile(vec![person_row("V-1001", "Pérez", "Ana")], Role::Student, "1999-01".into())
    .await
    .unwrap_err();
  assert_eq!(validation_field(&err), Some("term"));
  assert!(s.get_identity("V-1001".into()).await.unwrap().is_none());
}

// ─── Terms ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_term_updates_dates() {
  let s = store().await;
  add_term(&s, TERM).await;
  s.upsert_term(Term {
    code:      TERM.into(),
    starts_on: date(2025, 9, 15),
    ends_on:   date(2026, 2, 15),
  })
  .await
  .unwrap();

  let terms = s.list_terms().await.unwrap();
  assert_eq!(terms.len(), 1);
  assert_eq!(terms[0].starts_on, date(2025, 9, 15));

  let err = s
    .upsert_term(Term { code: "bad".into(), starts_on: date(2026, 1, 1), ends_on: date(2025, 1, 1) })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}
