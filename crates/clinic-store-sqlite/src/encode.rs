//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as ISO 8601
//! `YYYY-MM-DD`, enums as their snake_case codes and UUIDs as hyphenated
//! lowercase strings. Booleans are 0/1 integers.

use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::{
  assignment::Assignment,
  case::{Beneficiary, BeneficiaryKind, Case, CaseNumber, LegalSupport},
  person::{Identity, ParticipationKind, Role, Sex},
  status::{CaseStatus, Sequence, StatusEntry},
  taxonomy::{LegalScopePath, LocalNumber, SubjectId},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<CaseStatus> {
  s.parse::<CaseStatus>().map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "student" => Ok(Role::Student),
    "supervisor" => Ok(Role::Supervisor),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

pub fn encode_sex(sex: Sex) -> &'static str {
  match sex {
    Sex::Female => "female",
    Sex::Male => "male",
  }
}

pub fn decode_sex(s: &str) -> Result<Sex> {
  match s {
    "female" => Ok(Sex::Female),
    "male" => Ok(Sex::Male),
    other => Err(Error::Decode(format!("unknown sex: {other:?}"))),
  }
}

pub fn encode_beneficiary_kind(kind: BeneficiaryKind) -> &'static str {
  match kind {
    BeneficiaryKind::Direct => "direct",
    BeneficiaryKind::Indirect => "indirect",
  }
}

pub fn decode_beneficiary_kind(s: &str) -> Result<BeneficiaryKind> {
  match s {
    "direct" => Ok(BeneficiaryKind::Direct),
    "indirect" => Ok(BeneficiaryKind::Indirect),
    other => Err(Error::Decode(format!("unknown beneficiary kind: {other:?}"))),
  }
}

pub fn decode_participation(s: &str) -> Result<ParticipationKind> {
  [
    ParticipationKind::Enrolled,
    ParticipationKind::Graduate,
    ParticipationKind::Titular,
    ParticipationKind::Advisor,
    ParticipationKind::Volunteer,
  ]
  .into_iter()
  .find(|kind| kind.as_str() == s)
  .ok_or_else(|| Error::Decode(format!("unknown participation: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCase::from_row`].
pub const CASE_COLUMNS: &str = "case_number, applicant_id, facility_id, procedure_type_id,
  subject_id, category_number, subcategory_number, scope_number,
  synopsis, start_date, end_date, term, created_at";

/// Raw values read directly from a `cases` row.
pub struct RawCase {
  pub case_number:        CaseNumber,
  pub applicant_id:       String,
  pub facility_id:        i64,
  pub procedure_type_id:  i64,
  pub subject_id:         SubjectId,
  pub category_number:    LocalNumber,
  pub subcategory_number: LocalNumber,
  pub scope_number:       LocalNumber,
  pub synopsis:           String,
  pub start_date:         String,
  pub end_date:           Option<String>,
  pub term:               String,
  pub created_at:         String,
}

impl RawCase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_number:        row.get(0)?,
      applicant_id:       row.get(1)?,
      facility_id:        row.get(2)?,
      procedure_type_id:  row.get(3)?,
      subject_id:         row.get(4)?,
      category_number:    row.get(5)?,
      subcategory_number: row.get(6)?,
      scope_number:       row.get(7)?,
      synopsis:           row.get(8)?,
      start_date:         row.get(9)?,
      end_date:           row.get(10)?,
      term:               row.get(11)?,
      created_at:         row.get(12)?,
    })
  }

  pub fn into_case(self) -> Result<Case> {
    Ok(Case {
      case_number:       self.case_number,
      applicant_id:      self.applicant_id,
      facility_id:       self.facility_id,
      procedure_type_id: self.procedure_type_id,
      legal_scope:       LegalScopePath {
        subject_id:  self.subject_id,
        category:    self.category_number,
        subcategory: self.subcategory_number,
        scope:       self.scope_number,
      },
      synopsis:          self.synopsis,
      start_date:        decode_date(&self.start_date)?,
      end_date:          self.end_date.as_deref().map(decode_date).transpose()?,
      term:              self.term,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `beneficiaries` row.
pub struct RawBeneficiary {
  pub case_number:     CaseNumber,
  pub identity_number: String,
  pub owns_identity:   bool,
  pub first_names:     String,
  pub last_names:      String,
  pub sex:             Option<String>,
  pub birth_date:      Option<String>,
  pub kind:            String,
  pub has_kinship:     bool,
}

impl RawBeneficiary {
  pub fn into_beneficiary(self) -> Result<Beneficiary> {
    Ok(Beneficiary {
      case_number:     self.case_number,
      identity_number: self.identity_number,
      owns_identity:   self.owns_identity,
      first_names:     self.first_names,
      last_names:      self.last_names,
      sex:             self.sex.as_deref().map(decode_sex).transpose()?,
      birth_date:      self.birth_date.as_deref().map(decode_date).transpose()?,
      kind:            decode_beneficiary_kind(&self.kind)?,
      has_kinship:     self.has_kinship,
    })
  }
}

/// Raw values read from a `legal_supports` row.
pub struct RawSupport {
  pub support_id:   String,
  pub case_number:  CaseNumber,
  pub description:  String,
  pub document_url: String,
  pub observation:  Option<String>,
  pub created_at:   String,
}

impl RawSupport {
  pub fn into_support(self) -> Result<LegalSupport> {
    Ok(LegalSupport {
      support_id:   decode_uuid(&self.support_id)?,
      case_number:  self.case_number,
      description:  self.description,
      document_url: self.document_url,
      observation:  self.observation,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawStatusEntry::from_row`].
pub const STATUS_COLUMNS: &str =
  "case_number, sequence, status, recorded_at, reason, acting_person";

/// Raw values read from a `status_entries` row.
pub struct RawStatusEntry {
  pub case_number:   CaseNumber,
  pub sequence:      Sequence,
  pub status:        String,
  pub recorded_at:   String,
  pub reason:        String,
  pub acting_person: String,
}

impl RawStatusEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_number:   row.get(0)?,
      sequence:      row.get(1)?,
      status:        row.get(2)?,
      recorded_at:   row.get(3)?,
      reason:        row.get(4)?,
      acting_person: row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<StatusEntry> {
    Ok(StatusEntry {
      case_number:   self.case_number,
      sequence:      self.sequence,
      status:        decode_status(&self.status)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
      reason:        self.reason,
      acting_person: self.acting_person,
    })
  }
}

/// Column list matching [`RawAssignment::from_row`].
pub const ASSIGNMENT_COLUMNS: &str =
  "case_number, person_id, term, role, active, assigned_at, released_at";

/// Raw values read from an `assignments` row.
pub struct RawAssignment {
  pub case_number: CaseNumber,
  pub person_id:   String,
  pub term:        String,
  pub role:        String,
  pub active:      bool,
  pub assigned_at: String,
  pub released_at: Option<String>,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_number: row.get(0)?,
      person_id:   row.get(1)?,
      term:        row.get(2)?,
      role:        row.get(3)?,
      active:      row.get(4)?,
      assigned_at: row.get(5)?,
      released_at: row.get(6)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      case_number: self.case_number,
      person_id:   self.person_id,
      term:        self.term,
      role:        decode_role(&self.role)?,
      active:      self.active,
      assigned_at: decode_dt(&self.assigned_at)?,
      released_at: self.released_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Column list matching [`RawIdentity::from_row`], qualified for joins.
pub const IDENTITY_COLUMNS: &str = "i.identity_id, i.first_names, i.last_names, i.email,
  i.phone, i.sex, i.role, i.created_at";

/// Raw values read from an `identities` row.
pub struct RawIdentity {
  pub identity_id: String,
  pub first_names: String,
  pub last_names:  String,
  pub email:       String,
  pub phone:       Option<String>,
  pub sex:         Option<String>,
  pub role:        String,
  pub created_at:  String,
}

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id: row.get(0)?,
      first_names: row.get(1)?,
      last_names:  row.get(2)?,
      email:       row.get(3)?,
      phone:       row.get(4)?,
      sex:         row.get(5)?,
      role:        row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      id:          self.identity_id,
      first_names: self.first_names,
      last_names:  self.last_names,
      email:       self.email,
      phone:       self.phone,
      sex:         self.sex.as_deref().map(decode_sex).transpose()?,
      role:        decode_role(&self.role)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
