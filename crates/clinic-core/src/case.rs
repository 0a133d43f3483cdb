//! Cases and the records that hang off them.
//!
//! A case is opened together with its beneficiaries, its first status entry,
//! an optional initial assignment and any supporting documents, all in one
//! transaction. The input types here carry the checks that need no store
//! access; the store adds the ones that do (term, taxonomy leaf, people).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::AssignmentRequest,
  person::{Sex, normalize_national_id},
  status::{CaseStatus, StatusChange, StatusEntry},
  taxonomy::{LegalScopePath, ResolvedLegalScope},
};

/// Sequential, never reused.
pub type CaseNumber = i64;

const DEFAULT_OPENING_REASON: &str = "case opened";

// ─── Case ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
  pub case_number:       CaseNumber,
  /// National ID of the person who brought the case.
  pub applicant_id:      String,
  pub facility_id:       i64,
  pub procedure_type_id: i64,
  pub legal_scope:       LegalScopePath,
  pub synopsis:          String,
  pub start_date:        NaiveDate,
  pub end_date:          Option<NaiveDate>,
  /// Academic term the case was opened in.
  pub term:              String,
  pub created_at:        DateTime<Utc>,
}

// ─── Beneficiaries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryKind {
  Direct,
  Indirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
  pub case_number:     CaseNumber,
  pub identity_number: String,
  /// `false` when the identity number belongs to someone else, e.g. a minor
  /// filed under a parent's number.
  pub owns_identity:   bool,
  pub first_names:     String,
  pub last_names:      String,
  pub sex:             Option<Sex>,
  pub birth_date:      Option<NaiveDate>,
  pub kind:            BeneficiaryKind,
  pub has_kinship:     bool,
}

/// A beneficiary as submitted. The required fields are optional here so a
/// missing one is reported by name instead of failing deserialisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBeneficiary {
  pub identity_number: Option<String>,
  #[serde(default = "owns_identity_default")]
  pub owns_identity:   bool,
  #[serde(default)]
  pub first_names:     String,
  #[serde(default)]
  pub last_names:      String,
  pub sex:             Option<Sex>,
  pub birth_date:      Option<NaiveDate>,
  pub kind:            Option<BeneficiaryKind>,
  pub has_kinship:     Option<bool>,
}

fn owns_identity_default() -> bool { true }

impl NewBeneficiary {
  /// A direct beneficiary with the applicant's own identity.
  pub fn applicant(
    identity_number: impl Into<String>,
    first_names: impl Into<String>,
    last_names: impl Into<String>,
  ) -> Self {
    Self {
      identity_number: Some(identity_number.into()),
      owns_identity:   true,
      first_names:     first_names.into(),
      last_names:      last_names.into(),
      sex:             None,
      birth_date:      None,
      kind:            Some(BeneficiaryKind::Direct),
      has_kinship:     Some(false),
    }
  }

  /// Check required fields and bind to `case_number`. `index` is the
  /// position in the submitted list and only shapes error field names.
  pub fn to_beneficiary(
    &self,
    case_number: CaseNumber,
    index: usize,
  ) -> Result<Beneficiary> {
    let field = |name: &str| format!("beneficiaries[{index}].{name}");

    let identity_number = self
      .identity_number
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .ok_or_else(|| Error::invalid(field("identity_number"), "is required"))?;
    let kind = self
      .kind
      .ok_or_else(|| Error::invalid(field("kind"), "is required"))?;
    let has_kinship = self
      .has_kinship
      .ok_or_else(|| Error::invalid(field("has_kinship"), "must be yes or no"))?;

    Ok(Beneficiary {
      case_number,
      identity_number: identity_number.to_owned(),
      owns_identity: self.owns_identity,
      first_names: self.first_names.trim().to_owned(),
      last_names: self.last_names.trim().to_owned(),
      sex: self.sex,
      birth_date: self.birth_date,
      kind,
      has_kinship,
    })
  }
}

// ─── Legal supports ──────────────────────────────────────────────────────────

/// A document attached to a case. The file itself lives with the external
/// document host; only its URL is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalSupport {
  pub support_id:   Uuid,
  pub case_number:  CaseNumber,
  pub description:  String,
  pub document_url: String,
  pub observation:  Option<String>,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupport {
  pub description:  String,
  pub document_url: String,
  #[serde(default)]
  pub observation:  Option<String>,
}

impl NewSupport {
  pub fn to_support(&self, case_number: CaseNumber, field: &str) -> Result<LegalSupport> {
    if self.description.trim().is_empty() {
      return Err(Error::invalid(format!("{field}.description"), "must not be empty"));
    }
    let url = Url::parse(self.document_url.trim()).map_err(|e| {
      Error::invalid(format!("{field}.document_url"), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(Error::invalid(
        format!("{field}.document_url"),
        "must be an http or https URL",
      ));
    }

    Ok(LegalSupport {
      support_id: Uuid::new_v4(),
      case_number,
      description: self.description.trim().to_owned(),
      document_url: url.to_string(),
      observation: self
        .observation
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned),
      created_at: Utc::now(),
    })
  }
}

// ─── NewCase ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ClinicStore::create_case`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
  pub applicant_id:      String,
  pub legal_scope:       LegalScopePath,
  pub facility_id:       i64,
  pub procedure_type_id: i64,
  pub synopsis:          String,
  pub start_date:        NaiveDate,
  #[serde(default)]
  pub end_date:          Option<NaiveDate>,
  pub term:              String,
  pub initial_status:    CaseStatus,
  /// Reason recorded on the first status entry.
  #[serde(default)]
  pub status_reason:     Option<String>,
  /// Acting person recorded on the first status entry.
  pub opened_by:         String,
  pub beneficiaries:     Vec<NewBeneficiary>,
  #[serde(default)]
  pub assignment:        Option<AssignmentRequest>,
  #[serde(default)]
  pub supports:          Vec<NewSupport>,
}

impl NewCase {
  /// Every check that does not need the store.
  pub fn validate(&self) -> Result<()> {
    self.normalized_applicant_id()?;
    require_text("synopsis", &self.synopsis)?;
    require_text("term", &self.term)?;
    check_dates(self.start_date, self.end_date)?;

    if self.beneficiaries.is_empty() {
      return Err(Error::invalid("beneficiaries", "at least one beneficiary is required"));
    }
    for (i, b) in self.beneficiaries.iter().enumerate() {
      b.to_beneficiary(0, i)?;
    }
    for (i, s) in self.supports.iter().enumerate() {
      s.to_support(0, &format!("supports[{i}]"))?;
    }
    if let Some(request) = &self.assignment {
      request.validate()?;
    }
    self.initial_status_change().validate()
  }

  pub fn normalized_applicant_id(&self) -> Result<String> {
    national_id("applicant_id", &self.applicant_id)
  }

  pub fn initial_status_change(&self) -> StatusChange {
    let reason = self
      .status_reason
      .as_deref()
      .map(str::trim)
      .filter(|r| !r.is_empty())
      .unwrap_or(DEFAULT_OPENING_REASON);
    StatusChange::new(self.initial_status, reason, self.opened_by.trim())
  }
}

// ─── CasePatch ───────────────────────────────────────────────────────────────

/// Partial update; `None` leaves the field untouched. `end_date` can be
/// cleared by sending `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePatch {
  pub applicant_id:      Option<String>,
  pub legal_scope:       Option<LegalScopePath>,
  pub facility_id:       Option<i64>,
  pub procedure_type_id: Option<i64>,
  pub synopsis:          Option<String>,
  pub start_date:        Option<NaiveDate>,
  #[serde(default, deserialize_with = "present")]
  pub end_date:          Option<Option<NaiveDate>>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(de).map(Some)
}

impl CasePatch {
  pub fn is_empty(&self) -> bool { self == &Self::default() }

  /// Apply onto `case`, re-checking the merged result.
  pub fn apply(&self, case: &mut Case) -> Result<()> {
    if let Some(applicant_id) = &self.applicant_id {
      case.applicant_id = national_id("applicant_id", applicant_id)?;
    }
    if let Some(synopsis) = &self.synopsis {
      require_text("synopsis", synopsis)?;
      case.synopsis = synopsis.trim().to_owned();
    }
    if let Some(legal_scope) = self.legal_scope {
      case.legal_scope = legal_scope;
    }
    if let Some(facility_id) = self.facility_id {
      case.facility_id = facility_id;
    }
    if let Some(procedure_type_id) = self.procedure_type_id {
      case.procedure_type_id = procedure_type_id;
    }
    if let Some(start_date) = self.start_date {
      case.start_date = start_date;
    }
    if let Some(end_date) = self.end_date {
      case.end_date = end_date;
    }
    check_dates(case.start_date, case.end_date)
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Everything shown on a case page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDetail {
  pub case:           Case,
  pub classification: ResolvedLegalScope,
  pub beneficiaries:  Vec<Beneficiary>,
  pub supports:       Vec<LegalSupport>,
  pub current_status: Option<StatusEntry>,
}

/// Parameters for [`crate::store::ClinicStore::list_cases`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFilter {
  pub term:   Option<String>,
  /// Matches the case's current status.
  pub status: Option<CaseStatus>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::invalid(field, "must not be empty"));
  }
  Ok(())
}

fn national_id(field: &str, value: &str) -> Result<String> {
  normalize_national_id(value)
    .map_err(|_| Error::invalid(field, format!("malformed national id {:?}", value.trim())))
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
  match end {
    Some(end) if end < start => {
      Err(Error::invalid("end_date", "must not precede start_date"))
    }
    _ => Ok(()),
  }
}
