//! [`SqliteStore`] — the SQLite implementation of [`ClinicStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use clinic_core::{
  Error as CoreError,
  assignment::{Assignment, AssignmentOutcome},
  case::{
    Beneficiary, Case, CaseDetail, CaseFilter, CaseNumber, CasePatch, LegalSupport, NewCase,
    NewSupport,
  },
  person::{
    Actor, AvailablePerson, Identity, Participation, Role, Term, normalize_national_id,
  },
  reconcile::{ImportRow, ReconcileReport, RowOutcome, RowStatus, ValidatedRow},
  status::{Sequence, StatusChange, StatusEntry, StatusLedger},
  store::ClinicStore,
  taxonomy::{
    Category, CategoryPath, LegalScope, LegalScopePath, LocalNumber, NodePath,
    ResolvedLegalScope, Subcategory, SubcategoryPath, Subject, SubjectId, normalize_node_name,
  },
};
use rusqlite::{
  Connection, OptionalExtension as _, Transaction, TransactionBehavior, params,
  params_from_iter, types::Value,
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  encode::{
    ASSIGNMENT_COLUMNS, CASE_COLUMNS, IDENTITY_COLUMNS, RawAssignment, RawBeneficiary, RawCase,
    RawIdentity, RawStatusEntry, RawSupport, STATUS_COLUMNS, decode_date, decode_participation,
    decode_role, encode_beneficiary_kind, encode_date, encode_dt, encode_sex, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Upper bound on how long a transaction waits for the write lock before
  /// failing with a retryable conflict.
  pub busy_timeout:      Duration,
  /// Number given to the first case ever created in a fresh database.
  pub first_case_number: CaseNumber,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { busy_timeout: Duration::from_secs(5), first_case_number: 1 }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clinic store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(options).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreOptions::default()).await
  }

  pub async fn open_in_memory_with(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(options).await?;
    Ok(store)
  }

  async fn init(&self, options: StoreOptions) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
          "INSERT OR IGNORE INTO sequences (name, next_value) VALUES ('case_number', ?1)",
          params![options.first_case_number],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread.
  pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction that commits only if `f`
  /// succeeds. On error the transaction is dropped, which rolls it back.
  pub(crate) async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = f(&tx);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}

// ─── Existence checks ────────────────────────────────────────────────────────

fn term_exists(conn: &Connection, code: &str) -> Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM terms WHERE code = ?1", params![code], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn require_term(conn: &Connection, code: &str, field: &str) -> Result<()> {
  if term_exists(conn, code)? {
    Ok(())
  } else {
    Err(CoreError::invalid(field, format!("unknown term {code:?}")).into())
  }
}

fn require_case(conn: &Connection, case_number: CaseNumber) -> Result<()> {
  let exists = conn
    .query_row(
      "SELECT 1 FROM cases WHERE case_number = ?1",
      params![case_number],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if exists {
    Ok(())
  } else {
    Err(CoreError::CaseNotFound(case_number).into())
  }
}

/// Walk the full path from subject to leaf.
fn resolve_scope(conn: &Connection, path: LegalScopePath) -> Result<Option<ResolvedLegalScope>> {
  Ok(
    conn
      .query_row(
        "SELECT s.name, c.name, sc.name, l.name
         FROM legal_scopes l
         JOIN subcategories sc ON sc.subject_id         = l.subject_id
                              AND sc.category_number    = l.category_number
                              AND sc.subcategory_number = l.subcategory_number
         JOIN categories c     ON c.subject_id          = l.subject_id
                              AND c.category_number     = l.category_number
         JOIN subjects s       ON s.subject_id          = l.subject_id
         WHERE l.subject_id = ?1 AND l.category_number = ?2
           AND l.subcategory_number = ?3 AND l.scope_number = ?4",
        params![path.subject_id, path.category, path.subcategory, path.scope],
        |row| {
          Ok(ResolvedLegalScope {
            path,
            subject:     row.get(0)?,
            category:    row.get(1)?,
            subcategory: row.get(2)?,
            legal_scope: row.get(3)?,
          })
        },
      )
      .optional()?,
  )
}

/// Table, key predicate and key values addressing one taxonomy node.
fn node_target(path: NodePath) -> (&'static str, &'static str, Vec<Value>) {
  match path {
    NodePath::Subject { subject_id } => {
      ("subjects", "subject_id = ?1", vec![Value::Integer(subject_id)])
    }
    NodePath::Category(p) => (
      "categories",
      "subject_id = ?1 AND category_number = ?2",
      vec![Value::Integer(p.subject_id), Value::Integer(p.category.into())],
    ),
    NodePath::Subcategory(p) => (
      "subcategories",
      "subject_id = ?1 AND category_number = ?2 AND subcategory_number = ?3",
      vec![
        Value::Integer(p.subject_id),
        Value::Integer(p.category.into()),
        Value::Integer(p.subcategory.into()),
      ],
    ),
    NodePath::LegalScope(p) => (
      "legal_scopes",
      "subject_id = ?1 AND category_number = ?2 AND subcategory_number = ?3 AND scope_number = ?4",
      vec![
        Value::Integer(p.subject_id),
        Value::Integer(p.category.into()),
        Value::Integer(p.subcategory.into()),
        Value::Integer(p.scope.into()),
      ],
    ),
  }
}

// ─── Case writes ─────────────────────────────────────────────────────────────

/// Take the next case number from the sequence row; the row update also
/// serialises concurrent creators.
fn next_case_number(conn: &Connection) -> Result<CaseNumber> {
  Ok(conn.query_row(
    "UPDATE sequences SET next_value = next_value + 1
     WHERE name = 'case_number'
     RETURNING next_value - 1",
    [],
    |row| row.get(0),
  )?)
}

fn insert_case(conn: &Connection, case: &Case) -> Result<()> {
  let scope = case.legal_scope;
  conn.execute(
    "INSERT INTO cases (
       case_number, applicant_id, facility_id, procedure_type_id,
       subject_id, category_number, subcategory_number, scope_number,
       synopsis, start_date, end_date, term, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    params![
      case.case_number,
      case.applicant_id,
      case.facility_id,
      case.procedure_type_id,
      scope.subject_id,
      scope.category,
      scope.subcategory,
      scope.scope,
      case.synopsis,
      encode_date(case.start_date),
      case.end_date.map(encode_date),
      case.term,
      encode_dt(case.created_at),
    ],
  )?;
  Ok(())
}

fn insert_beneficiary(conn: &Connection, position: usize, b: &Beneficiary) -> Result<()> {
  conn.execute(
    "INSERT INTO beneficiaries (
       case_number, position, identity_number, owns_identity, first_names,
       last_names, sex, birth_date, kind, has_kinship
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      b.case_number,
      position as i64,
      b.identity_number,
      b.owns_identity,
      b.first_names,
      b.last_names,
      b.sex.map(encode_sex),
      b.birth_date.map(encode_date),
      encode_beneficiary_kind(b.kind),
      b.has_kinship,
    ],
  )?;
  Ok(())
}

fn insert_support(conn: &Connection, s: &LegalSupport) -> Result<()> {
  conn.execute(
    "INSERT INTO legal_supports (
       support_id, case_number, description, document_url, observation, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(s.support_id),
      s.case_number,
      s.description,
      s.document_url,
      s.observation,
      encode_dt(s.created_at),
    ],
  )?;
  Ok(())
}

fn load_case(conn: &Connection, case_number: CaseNumber) -> Result<Option<Case>> {
  conn
    .query_row(
      &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_number = ?1"),
      params![case_number],
      RawCase::from_row,
    )
    .optional()?
    .map(RawCase::into_case)
    .transpose()
}

// ─── Status ledger ───────────────────────────────────────────────────────────

/// Append the next entry. Runs inside the caller's write transaction, which
/// holds the write lock, so the computed sequence cannot be taken twice; the
/// primary key rejects it if it ever were.
fn append_status(
  conn: &Connection,
  case_number: CaseNumber,
  change: &StatusChange,
) -> Result<StatusEntry> {
  let sequence: Sequence = conn.query_row(
    "SELECT COALESCE(MAX(sequence), 0) + 1 FROM status_entries WHERE case_number = ?1",
    params![case_number],
    |row| row.get(0),
  )?;

  let entry = StatusEntry {
    case_number,
    sequence,
    status: change.status,
    recorded_at: Utc::now(),
    reason: change.reason.trim().to_owned(),
    acting_person: change.acting_person.trim().to_owned(),
  };

  conn.execute(
    "INSERT INTO status_entries (
       case_number, sequence, status, recorded_at, reason, acting_person
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      entry.case_number,
      entry.sequence,
      entry.status.as_str(),
      encode_dt(entry.recorded_at),
      entry.reason,
      entry.acting_person,
    ],
  )?;
  Ok(entry)
}

fn latest_status(conn: &Connection, case_number: CaseNumber) -> Result<Option<StatusEntry>> {
  conn
    .query_row(
      &format!(
        "SELECT {STATUS_COLUMNS} FROM status_entries
         WHERE case_number = ?1 ORDER BY sequence DESC LIMIT 1"
      ),
      params![case_number],
      RawStatusEntry::from_row,
    )
    .optional()?
    .map(RawStatusEntry::into_entry)
    .transpose()
}

// ─── Assignments ─────────────────────────────────────────────────────────────

/// The person must hold a participation in `term` and be registered under
/// `role`.
fn check_available(
  conn: &Connection,
  person_id: &str,
  term: &str,
  role: Role,
  field: &str,
) -> Result<()> {
  let registered: Option<String> = conn
    .query_row(
      "SELECT i.role FROM identities i
       JOIN participations p ON p.identity_id = i.identity_id
       WHERE i.identity_id = ?1 AND p.term = ?2",
      params![person_id, term],
      |row| row.get(0),
    )
    .optional()?;

  match registered {
    None => Err(
      CoreError::invalid(field, format!("{person_id} does not participate in term {term}"))
        .into(),
    ),
    Some(r) if decode_role(&r)? != role => Err(
      CoreError::invalid(field, format!("{person_id} is registered as a {r}, not a {role}"))
        .into(),
    ),
    Some(_) => Ok(()),
  }
}

fn active_assignment_of(
  conn: &Connection,
  case_number: CaseNumber,
  person_id: &str,
  term: &str,
) -> Result<Option<Assignment>> {
  conn
    .query_row(
      &format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE case_number = ?1 AND person_id = ?2 AND term = ?3 AND active = 1"
      ),
      params![case_number, person_id, term],
      RawAssignment::from_row,
    )
    .optional()?
    .map(RawAssignment::into_assignment)
    .transpose()
}

/// Assign within the caller's transaction. For a supervisor, the previously
/// active supervisor of the case and term is deactivated before the insert,
/// so there is never a moment with two active rows.
fn assign(
  conn: &Connection,
  case_number: CaseNumber,
  person_id: &str,
  term: &str,
  role: Role,
  field: &str,
) -> Result<AssignmentOutcome> {
  let person_id = normalize_national_id(person_id)
    .map_err(|_| CoreError::invalid(field, format!("malformed national id {person_id:?}")))?;
  check_available(conn, &person_id, term, role, field)?;

  if let Some(existing) = active_assignment_of(conn, case_number, &person_id, term)? {
    if existing.role == role {
      return Ok(AssignmentOutcome::Unchanged { assignment: existing });
    }
    return Err(
      CoreError::invalid(
        field,
        format!(
          "{person_id} is already the active {} of case {case_number} in {term}",
          existing.role
        ),
      )
      .into(),
    );
  }

  let now = Utc::now();
  let previous = match role {
    Role::Student => None,
    Role::Supervisor => conn
      .query_row(
        &format!(
          "UPDATE assignments SET active = 0, released_at = ?3
           WHERE case_number = ?1 AND term = ?2 AND role = 'supervisor' AND active = 1
           RETURNING {ASSIGNMENT_COLUMNS}"
        ),
        params![case_number, term, encode_dt(now)],
        RawAssignment::from_row,
      )
      .optional()?
      .map(RawAssignment::into_assignment)
      .transpose()?,
  };

  // The partial unique index is the real guard against a second active row.
  let inserted = conn.execute(
    "INSERT INTO assignments (case_number, person_id, term, role, active, assigned_at)
     VALUES (?1, ?2, ?3, ?4, 1, ?5)
     ON CONFLICT (case_number, person_id, term) WHERE active = 1 DO NOTHING",
    params![case_number, person_id, term, role.as_str(), encode_dt(now)],
  )?;
  if inserted == 0 {
    return Err(CoreError::invalid(field, "duplicate active assignment").into());
  }

  let assignment = Assignment {
    case_number,
    person_id,
    term: term.to_owned(),
    role,
    active: true,
    assigned_at: now,
    released_at: None,
  };
  Ok(match previous {
    Some(previous) => AssignmentOutcome::Superseded { assignment, previous },
    None => AssignmentOutcome::Created { assignment },
  })
}

fn query_assignments(
  conn: &Connection,
  case_number: CaseNumber,
  include_inactive: bool,
) -> Result<Vec<Assignment>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
     WHERE case_number = ?1 AND (?2 OR active = 1)
     ORDER BY assignment_id"
  ))?;
  let raws = stmt
    .query_map(params![case_number, include_inactive], RawAssignment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAssignment::into_assignment).collect()
}

// ─── Bulk reconciliation ─────────────────────────────────────────────────────

fn reconcile_batch(
  conn: &mut Connection,
  rows: Vec<(usize, Result<ValidatedRow, CoreError>)>,
  role: Role,
  term: &str,
) -> Result<ReconcileReport> {
  require_term(conn, term, "term")?;

  let mut report = ReconcileReport::default();
  for (row, checked) in rows {
    let outcome = match checked {
      Err(e) => RowOutcome { row, id: None, status: RowStatus::Error { reason: e.to_string() } },
      Ok(valid) => match reconcile_row(conn, &valid, role, term) {
        Ok(status) => RowOutcome { row, id: Some(valid.id), status },
        Err(e) if e.is_row_level() => RowOutcome {
          row,
          id: Some(valid.id),
          status: RowStatus::Error { reason: e.to_string() },
        },
        Err(e) => return Err(e),
      },
    };
    if let RowStatus::Error { reason } = &outcome.status {
      warn!(row, %reason, "import row rejected");
    }
    report.record(outcome);
  }
  Ok(report)
}

/// Create or link one identity in its own transaction. Existing identities
/// keep their personal fields; only the participation is written.
fn reconcile_row(
  conn: &mut Connection,
  row: &ValidatedRow,
  role: Role,
  term: &str,
) -> Result<RowStatus> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let registered: Option<String> = tx
    .query_row(
      "SELECT role FROM identities WHERE identity_id = ?1",
      params![row.id],
      |r| r.get(0),
    )
    .optional()?;

  let status = match registered {
    None => {
      tx.execute(
        "INSERT INTO identities (
           identity_id, first_names, last_names, email, phone, sex, role, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          row.id,
          row.first_names,
          row.last_names,
          row.email,
          row.phone,
          row.sex.map(encode_sex),
          role.as_str(),
          encode_dt(Utc::now()),
        ],
      )?;
      RowStatus::Created
    }
    Some(r) => {
      let registered = decode_role(&r)?;
      if registered != role {
        return Err(
          CoreError::invalid("role", format!("{} is registered as a {registered}", row.id))
            .into(),
        );
      }
      RowStatus::Updated
    }
  };

  tx.execute(
    "INSERT INTO participations (identity_id, term, kind, updated_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (identity_id, term) DO UPDATE
       SET kind = excluded.kind, updated_at = excluded.updated_at
       WHERE kind <> excluded.kind",
    params![row.id, term, row.participation.as_str(), encode_dt(Utc::now())],
  )?;

  tx.commit()?;
  Ok(status)
}

// ─── ClinicStore impl ────────────────────────────────────────────────────────

impl ClinicStore for SqliteStore {
  type Error = Error;

  // ── Term catalog ──────────────────────────────────────────────────────────

  async fn upsert_term(&self, term: Term) -> Result<Term> {
    term.validate()?;
    let term = Term { code: term.code.trim().to_owned(), ..term };
    let stored = term.clone();

    self
      .write(move |tx| {
        tx.execute(
          "INSERT INTO terms (code, starts_on, ends_on) VALUES (?1, ?2, ?3)
           ON CONFLICT (code) DO UPDATE
             SET starts_on = excluded.starts_on, ends_on = excluded.ends_on",
          params![term.code, encode_date(term.starts_on), encode_date(term.ends_on)],
        )?;
        Ok(())
      })
      .await?;

    info!(code = %stored.code, "term stored");
    Ok(stored)
  }

  async fn list_terms(&self) -> Result<Vec<Term>> {
    self
      .read(|conn| {
        let mut stmt =
          conn.prepare("SELECT code, starts_on, ends_on FROM terms ORDER BY starts_on DESC")?;
        let raws = stmt
          .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws
          .into_iter()
          .map(|(code, starts_on, ends_on)| -> Result<Term> {
            Ok(Term { code, starts_on: decode_date(&starts_on)?, ends_on: decode_date(&ends_on)? })
          })
          .collect()
      })
      .await
  }

  // ── Taxonomy ──────────────────────────────────────────────────────────────

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    self
      .read(|conn| {
        let mut stmt = conn.prepare("SELECT subject_id, name FROM subjects ORDER BY subject_id")?;
        let rows = stmt
          .query_map([], |row| Ok(Subject { id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_categories(&self, subject_id: SubjectId) -> Result<Vec<Category>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT category_number, name FROM categories
           WHERE subject_id = ?1 ORDER BY category_number",
        )?;
        let rows = stmt
          .query_map(params![subject_id], |row| {
            Ok(Category { subject_id, number: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_subcategories(&self, parent: CategoryPath) -> Result<Vec<Subcategory>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subcategory_number, name FROM subcategories
           WHERE subject_id = ?1 AND category_number = ?2
           ORDER BY subcategory_number",
        )?;
        let rows = stmt
          .query_map(params![parent.subject_id, parent.category], |row| {
            Ok(Subcategory {
              subject_id:      parent.subject_id,
              category_number: parent.category,
              number:          row.get(0)?,
              name:            row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_legal_scopes(&self, parent: SubcategoryPath) -> Result<Vec<LegalScope>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT scope_number, name FROM legal_scopes
           WHERE subject_id = ?1 AND category_number = ?2 AND subcategory_number = ?3
           ORDER BY scope_number",
        )?;
        let rows = stmt
          .query_map(
            params![parent.subject_id, parent.category, parent.subcategory],
            |row| {
              Ok(LegalScope {
                subject_id:         parent.subject_id,
                category_number:    parent.category,
                subcategory_number: parent.subcategory,
                number:             row.get(0)?,
                name:               row.get(1)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn create_subject(&self, name: String) -> Result<Subject> {
    let name = normalize_node_name(&name)?;
    let subject = self
      .write(move |tx| {
        tx.execute("INSERT INTO subjects (name) VALUES (?1)", params![name])?;
        Ok(Subject { id: tx.last_insert_rowid(), name })
      })
      .await?;
    info!(subject_id = subject.id, "subject created");
    Ok(subject)
  }

  async fn create_category(&self, subject_id: SubjectId, name: String) -> Result<Category> {
    let name = normalize_node_name(&name)?;
    let category = self
      .write(move |tx| {
        let number: LocalNumber = tx
          .query_row(
            "UPDATE subjects SET next_category = next_category + 1
             WHERE subject_id = ?1
             RETURNING next_category - 1",
            params![subject_id],
            |row| row.get(0),
          )
          .optional()?
          .ok_or(CoreError::TaxonomyNodeNotFound(NodePath::Subject { subject_id }))?;
        tx.execute(
          "INSERT INTO categories (subject_id, category_number, name) VALUES (?1, ?2, ?3)",
          params![subject_id, number, name],
        )?;
        Ok(Category { subject_id, number, name })
      })
      .await?;
    info!(path = %NodePath::from(category.path()), "category created");
    Ok(category)
  }

  async fn create_subcategory(&self, parent: CategoryPath, name: String) -> Result<Subcategory> {
    let name = normalize_node_name(&name)?;
    let subcategory = self
      .write(move |tx| {
        let number: LocalNumber = tx
          .query_row(
            "UPDATE categories SET next_subcategory = next_subcategory + 1
             WHERE subject_id = ?1 AND category_number = ?2
             RETURNING next_subcategory - 1",
            params![parent.subject_id, parent.category],
            |row| row.get(0),
          )
          .optional()?
          .ok_or(CoreError::TaxonomyNodeNotFound(parent.into()))?;
        tx.execute(
          "INSERT INTO subcategories (subject_id, category_number, subcategory_number, name)
           VALUES (?1, ?2, ?3, ?4)",
          params![parent.subject_id, parent.category, number, name],
        )?;
        Ok(Subcategory {
          subject_id: parent.subject_id,
          category_number: parent.category,
          number,
          name,
        })
      })
      .await?;
    info!(path = %NodePath::from(subcategory.path()), "subcategory created");
    Ok(subcategory)
  }

  async fn create_legal_scope(&self, parent: SubcategoryPath, name: String) -> Result<LegalScope> {
    let name = normalize_node_name(&name)?;
    let scope = self
      .write(move |tx| {
        let number: LocalNumber = tx
          .query_row(
            "UPDATE subcategories SET next_scope = next_scope + 1
             WHERE subject_id = ?1 AND category_number = ?2 AND subcategory_number = ?3
             RETURNING next_scope - 1",
            params![parent.subject_id, parent.category, parent.subcategory],
            |row| row.get(0),
          )
          .optional()?
          .ok_or(CoreError::TaxonomyNodeNotFound(parent.into()))?;
        tx.execute(
          "INSERT INTO legal_scopes (
             subject_id, category_number, subcategory_number, scope_number, name
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          params![parent.subject_id, parent.category, parent.subcategory, number, name],
        )?;
        Ok(LegalScope {
          subject_id: parent.subject_id,
          category_number: parent.category,
          subcategory_number: parent.subcategory,
          number,
          name,
        })
      })
      .await?;
    info!(path = %NodePath::from(scope.path()), "legal scope created");
    Ok(scope)
  }

  async fn rename_node(&self, path: NodePath, name: String) -> Result<()> {
    let name = normalize_node_name(&name)?;
    self
      .write(move |tx| {
        let (table, clause, mut keys) = node_target(path);
        let sql = format!("UPDATE {table} SET name = ?{} WHERE {clause}", keys.len() + 1);
        keys.push(Value::Text(name));
        if tx.execute(&sql, params_from_iter(keys))? == 0 {
          return Err(CoreError::TaxonomyNodeNotFound(path).into());
        }
        Ok(())
      })
      .await?;
    info!(%path, "taxonomy node renamed");
    Ok(())
  }

  async fn delete_node(&self, path: NodePath) -> Result<()> {
    self
      .write(move |tx| {
        let (table, clause, keys) = node_target(path);
        let deleted = tx
          .execute(&format!("DELETE FROM {table} WHERE {clause}"), params_from_iter(keys))
          .map_err(Error::from)
          .map_err(|e| {
            if e.is_foreign_key_violation() { CoreError::TaxonomyInUse(path).into() } else { e }
          })?;
        if deleted == 0 {
          return Err(CoreError::TaxonomyNodeNotFound(path).into());
        }
        Ok(())
      })
      .await?;
    info!(%path, "taxonomy node deleted");
    Ok(())
  }

  async fn resolve_legal_scope(&self, path: LegalScopePath) -> Result<Option<ResolvedLegalScope>> {
    self.read(move |conn| resolve_scope(conn, path)).await
  }

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn create_case(&self, input: NewCase) -> Result<CaseNumber> {
    input.validate()?;
    let applicant_id = input.normalized_applicant_id()?;

    let case_number = self
      .write(move |tx| {
        require_term(tx, input.term.trim(), "term")?;
        if resolve_scope(tx, input.legal_scope)?.is_none() {
          return Err(
            CoreError::invalid(
              "legal_scope",
              format!("no legal scope at {}", NodePath::from(input.legal_scope)),
            )
            .into(),
          );
        }

        let case = Case {
          case_number:       next_case_number(tx)?,
          applicant_id,
          facility_id:       input.facility_id,
          procedure_type_id: input.procedure_type_id,
          legal_scope:       input.legal_scope,
          synopsis:          input.synopsis.trim().to_owned(),
          start_date:        input.start_date,
          end_date:          input.end_date,
          term:              input.term.trim().to_owned(),
          created_at:        Utc::now(),
        };
        insert_case(tx, &case)?;

        for (i, new) in input.beneficiaries.iter().enumerate() {
          insert_beneficiary(tx, i, &new.to_beneficiary(case.case_number, i)?)?;
        }

        append_status(tx, case.case_number, &input.initial_status_change())?;

        if let Some(request) = &input.assignment {
          let term = request.term.trim();
          require_term(tx, term, "assignment.term")?;
          for (person_id, role, field) in request.people() {
            assign(tx, case.case_number, person_id, term, role, &field)?;
          }
        }

        for (i, new) in input.supports.iter().enumerate() {
          insert_support(tx, &new.to_support(case.case_number, &format!("supports[{i}]"))?)?;
        }

        Ok(case.case_number)
      })
      .await?;

    info!(case_number, "case created");
    Ok(case_number)
  }

  async fn update_case(&self, case_number: CaseNumber, patch: CasePatch) -> Result<Case> {
    let case = self
      .write(move |tx| {
        let mut case = load_case(tx, case_number)?.ok_or(CoreError::CaseNotFound(case_number))?;
        if patch.is_empty() {
          return Ok(case);
        }
        patch.apply(&mut case)?;

        if patch.legal_scope.is_some() && resolve_scope(tx, case.legal_scope)?.is_none() {
          return Err(
            CoreError::invalid(
              "legal_scope",
              format!("no legal scope at {}", NodePath::from(case.legal_scope)),
            )
            .into(),
          );
        }

        let scope = case.legal_scope;
        tx.execute(
          "UPDATE cases SET
             applicant_id = ?2, facility_id = ?3, procedure_type_id = ?4,
             subject_id = ?5, category_number = ?6, subcategory_number = ?7, scope_number = ?8,
             synopsis = ?9, start_date = ?10, end_date = ?11
           WHERE case_number = ?1",
          params![
            case.case_number,
            case.applicant_id,
            case.facility_id,
            case.procedure_type_id,
            scope.subject_id,
            scope.category,
            scope.subcategory,
            scope.scope,
            case.synopsis,
            encode_date(case.start_date),
            case.end_date.map(encode_date),
          ],
        )?;
        Ok(case)
      })
      .await?;

    info!(case_number, "case updated");
    Ok(case)
  }

  async fn get_case(&self, case_number: CaseNumber) -> Result<Option<CaseDetail>> {
    debug!(case_number, "loading case");
    self
      .read(move |conn| {
        let Some(case) = load_case(conn, case_number)? else {
          return Ok(None);
        };

        let classification = resolve_scope(conn, case.legal_scope)?.ok_or_else(|| {
          Error::Decode(format!("case {case_number} references a missing legal scope"))
        })?;

        let mut stmt = conn.prepare(
          "SELECT case_number, identity_number, owns_identity, first_names, last_names,
                  sex, birth_date, kind, has_kinship
           FROM beneficiaries WHERE case_number = ?1 ORDER BY position",
        )?;
        let beneficiaries = stmt
          .query_map(params![case_number], |row| {
            Ok(RawBeneficiary {
              case_number:     row.get(0)?,
              identity_number: row.get(1)?,
              owns_identity:   row.get(2)?,
              first_names:     row.get(3)?,
              last_names:      row.get(4)?,
              sex:             row.get(5)?,
              birth_date:      row.get(6)?,
              kind:            row.get(7)?,
              has_kinship:     row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .map(RawBeneficiary::into_beneficiary)
          .collect::<Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT support_id, case_number, description, document_url, observation, created_at
           FROM legal_supports WHERE case_number = ?1 ORDER BY created_at, support_id",
        )?;
        let supports = stmt
          .query_map(params![case_number], |row| {
            Ok(RawSupport {
              support_id:   row.get(0)?,
              case_number:  row.get(1)?,
              description:  row.get(2)?,
              document_url: row.get(3)?,
              observation:  row.get(4)?,
              created_at:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .map(RawSupport::into_support)
          .collect::<Result<Vec<_>>>()?;

        let current_status = latest_status(conn, case_number)?;

        Ok(Some(CaseDetail { case, classification, beneficiaries, supports, current_status }))
      })
      .await
  }

  async fn list_cases(&self, filter: CaseFilter) -> Result<Vec<Case>> {
    let status = filter.status.map(|s| s.as_str());
    let limit = filter.limit.map_or(-1, |l| l as i64);
    let offset = filter.offset.unwrap_or(0) as i64;

    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CASE_COLUMNS} FROM cases c
           WHERE (?1 IS NULL OR c.term = ?1)
             AND (?2 IS NULL OR (
               SELECT s.status FROM status_entries s
               WHERE s.case_number = c.case_number
               ORDER BY s.sequence DESC LIMIT 1
             ) = ?2)
           ORDER BY c.case_number
           LIMIT ?3 OFFSET ?4"
        ))?;
        let raws = stmt
          .query_map(params![filter.term, status, limit, offset], RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawCase::into_case).collect()
      })
      .await
  }

  async fn add_support(&self, case_number: CaseNumber, support: NewSupport) -> Result<LegalSupport> {
    let support = support.to_support(case_number, "support")?;
    let stored = self
      .write(move |tx| {
        require_case(tx, case_number)?;
        insert_support(tx, &support)?;
        Ok(support)
      })
      .await?;
    info!(case_number, support_id = %stored.support_id, "support attached");
    Ok(stored)
  }

  async fn delete_case(&self, case_number: CaseNumber, actor: Actor) -> Result<()> {
    actor.require_elevated("delete cases")?;
    self
      .write(move |tx| {
        if tx.execute("DELETE FROM cases WHERE case_number = ?1", params![case_number])? == 0 {
          return Err(CoreError::CaseNotFound(case_number).into());
        }
        Ok(())
      })
      .await?;
    warn!(case_number, actor = %actor.person_id, "case deleted");
    Ok(())
  }

  // ── Status ledger ─────────────────────────────────────────────────────────

  async fn change_status(&self, case_number: CaseNumber, change: StatusChange) -> Result<StatusEntry> {
    change.validate()?;
    let entry = self
      .write(move |tx| {
        require_case(tx, case_number)?;
        append_status(tx, case_number, &change)
      })
      .await?;
    info!(case_number, sequence = entry.sequence, status = %entry.status, "status changed");
    Ok(entry)
  }

  async fn status_history(&self, case_number: CaseNumber) -> Result<StatusLedger> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STATUS_COLUMNS} FROM status_entries
           WHERE case_number = ?1 ORDER BY sequence"
        ))?;
        let entries = stmt
          .query_map(params![case_number], RawStatusEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .map(RawStatusEntry::into_entry)
          .collect::<Result<Vec<_>>>()?;
        Ok(StatusLedger::from_entries(entries))
      })
      .await
  }

  async fn current_status(&self, case_number: CaseNumber) -> Result<Option<StatusEntry>> {
    self.read(move |conn| latest_status(conn, case_number)).await
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn assign_student(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> Result<AssignmentOutcome> {
    let term = term.trim().to_owned();
    let outcome = self
      .write(move |tx| {
        require_case(tx, case_number)?;
        require_term(tx, &term, "term")?;
        assign(tx, case_number, &person_id, &term, Role::Student, "person_id")
      })
      .await?;
    info!(case_number, person_id = %outcome.assignment().person_id, "student assigned");
    Ok(outcome)
  }

  async fn assign_supervisor(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> Result<AssignmentOutcome> {
    let term = term.trim().to_owned();
    let outcome = self
      .write(move |tx| {
        require_case(tx, case_number)?;
        require_term(tx, &term, "term")?;
        assign(tx, case_number, &person_id, &term, Role::Supervisor, "person_id")
      })
      .await?;
    info!(case_number, person_id = %outcome.assignment().person_id, "supervisor assigned");
    Ok(outcome)
  }

  async fn release_assignment(
    &self,
    case_number: CaseNumber,
    person_id: String,
    term: String,
  ) -> Result<Assignment> {
    let person_id = normalize_national_id(&person_id)?;
    let term = term.trim().to_owned();
    let released = self
      .write(move |tx| {
        tx.query_row(
          &format!(
            "UPDATE assignments SET active = 0, released_at = ?4
             WHERE case_number = ?1 AND person_id = ?2 AND term = ?3 AND active = 1
             RETURNING {ASSIGNMENT_COLUMNS}"
          ),
          params![case_number, person_id, term, encode_dt(Utc::now())],
          RawAssignment::from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::AssignmentNotFound {
          case_number,
          person_id: person_id.clone(),
          term: term.clone(),
        })?
        .into_assignment()
      })
      .await?;
    info!(case_number, person_id = %released.person_id, "assignment released");
    Ok(released)
  }

  async fn active_assignments(&self, case_number: CaseNumber) -> Result<Vec<Assignment>> {
    self.list_assignments(case_number, false).await
  }

  async fn list_assignments(
    &self,
    case_number: CaseNumber,
    include_inactive: bool,
  ) -> Result<Vec<Assignment>> {
    self
      .read(move |conn| query_assignments(conn, case_number, include_inactive))
      .await
  }

  async fn list_available_people(&self, role: Role, term: String) -> Result<Vec<AvailablePerson>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS}, p.kind
           FROM identities i
           JOIN participations p ON p.identity_id = i.identity_id
           WHERE i.role = ?1 AND p.term = ?2
           ORDER BY i.last_names, i.first_names, i.identity_id"
        ))?;
        let raws = stmt
          .query_map(params![role.as_str(), term], |row| {
            Ok((RawIdentity::from_row(row)?, row.get::<_, String>(8)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws
          .into_iter()
          .map(|(raw, kind)| -> Result<AvailablePerson> {
            Ok(AvailablePerson {
              identity:      raw.into_identity()?,
              participation: decode_participation(&kind)?,
            })
          })
          .collect()
      })
      .await
  }

  // ── Bulk identity import ──────────────────────────────────────────────────

  async fn reconcile(&self, rows: Vec<ImportRow>, role: Role, term: String) -> Result<ReconcileReport> {
    let checked: Vec<_> = rows
      .iter()
      .enumerate()
      .map(|(i, row)| (row.row.unwrap_or(i + 1), row.validate(role)))
      .collect();
    let total = checked.len();

    let term_code = term.trim().to_owned();
    let report = self
      .conn
      .call(move |conn| Ok(reconcile_batch(conn, checked, role, &term_code)))
      .await??;

    info!(
      %role,
      term = %term.trim(),
      total,
      created = report.created,
      updated = report.updated,
      errors = report.errors.len(),
      "import reconciled"
    );
    Ok(report)
  }

  async fn get_identity(&self, id: String) -> Result<Option<Identity>> {
    let Ok(id) = normalize_national_id(&id) else {
      return Ok(None);
    };
    self
      .read(move |conn| {
        conn
          .query_row(
            &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.identity_id = ?1"),
            params![id],
            RawIdentity::from_row,
          )
          .optional()?
          .map(RawIdentity::into_identity)
          .transpose()
      })
      .await
  }

  async fn list_participations(&self, identity_id: String) -> Result<Vec<Participation>> {
    let Ok(identity_id) = normalize_national_id(&identity_id) else {
      return Ok(Vec::new());
    };
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT identity_id, term, kind FROM participations
           WHERE identity_id = ?1 ORDER BY term",
        )?;
        let raws = stmt
          .query_map(params![identity_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws
          .into_iter()
          .map(|(identity_id, term, kind)| -> Result<Participation> {
            Ok(Participation { identity_id, term, kind: decode_participation(&kind)? })
          })
          .collect()
      })
      .await
  }
}
