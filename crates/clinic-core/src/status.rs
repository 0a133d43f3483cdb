//! Case status and the append-only status ledger.
//!
//! A case's status is never stored on the case itself. Every transition is
//! appended to the ledger with the next sequence number, and the current
//! status is whichever entry carries the greatest sequence. Any status may
//! follow any other; the only requirement is that each transition records a
//! reason and who made it.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, case::CaseNumber};

/// Position of an entry within one case's ledger, starting at 1.
pub type Sequence = u32;

/// Serialised as its snake_case code. Deserialisation goes through
/// [`FromStr`], so the variant names (`"InProgress"`) are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum CaseStatus {
  InProgress,
  UnderAdvisory,
  Delivered,
  Archived,
  Paused,
}

impl CaseStatus {
  /// The code stored in the `status` column and used on the wire.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::InProgress => "in_progress",
      Self::UnderAdvisory => "under_advisory",
      Self::Delivered => "delivered",
      Self::Archived => "archived",
      Self::Paused => "paused",
    }
  }
}

impl fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts both the snake_case code and the PascalCase variant name.
impl FromStr for CaseStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let folded: String = s
      .chars()
      .filter(|c| *c != '_' && *c != ' ' && *c != '-')
      .map(|c| c.to_ascii_lowercase())
      .collect();
    match folded.as_str() {
      "inprogress" => Ok(Self::InProgress),
      "underadvisory" => Ok(Self::UnderAdvisory),
      "delivered" => Ok(Self::Delivered),
      "archived" => Ok(Self::Archived),
      "paused" => Ok(Self::Paused),
      _ => Err(Error::UnknownStatus(s.to_owned())),
    }
  }
}

impl TryFrom<String> for CaseStatus {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// One recorded transition. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
  pub case_number:   CaseNumber,
  pub sequence:      Sequence,
  pub status:        CaseStatus,
  /// Server-assigned.
  pub recorded_at:   DateTime<Utc>,
  pub reason:        String,
  pub acting_person: String,
}

/// Input to [`crate::store::ClinicStore::change_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
  pub status:        CaseStatus,
  pub reason:        String,
  pub acting_person: String,
}

impl StatusChange {
  pub fn new(
    status: CaseStatus,
    reason: impl Into<String>,
    acting_person: impl Into<String>,
  ) -> Self {
    Self { status, reason: reason.into(), acting_person: acting_person.into() }
  }

  pub fn validate(&self) -> Result<()> {
    if self.reason.trim().is_empty() {
      return Err(Error::invalid("reason", "a reason must be recorded"));
    }
    if self.acting_person.trim().is_empty() {
      return Err(Error::invalid("acting_person", "must not be empty"));
    }
    Ok(())
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The ordered status history of one case, oldest first.
///
/// Read-only by construction: there is no way to edit or remove an entry,
/// and the current status is computed from the entries on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusLedger {
  entries: Vec<StatusEntry>,
}

impl StatusLedger {
  pub fn from_entries(mut entries: Vec<StatusEntry>) -> Self {
    entries.sort_by_key(|e| e.sequence);
    Self { entries }
  }

  /// The entry with the greatest sequence.
  pub fn current(&self) -> Option<&StatusEntry> { self.entries.last() }

  pub fn current_status(&self) -> Option<CaseStatus> {
    self.current().map(|e| e.status)
  }

  pub fn entries(&self) -> &[StatusEntry] { &self.entries }

  pub fn iter(&self) -> std::slice::Iter<'_, StatusEntry> { self.entries.iter() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<'a> IntoIterator for &'a StatusLedger {
  type Item = &'a StatusEntry;
  type IntoIter = std::slice::Iter<'a, StatusEntry>;

  fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(sequence: Sequence, status: CaseStatus) -> StatusEntry {
    StatusEntry {
      case_number: 1001,
      sequence,
      status,
      recorded_at: Utc::now(),
      reason: "r".into(),
      acting_person: "V-123".into(),
    }
  }

  #[test]
  fn parses_code_and_variant_name() {
    assert_eq!("in_progress".parse::<CaseStatus>().unwrap(), CaseStatus::InProgress);
    assert_eq!("InProgress".parse::<CaseStatus>().unwrap(), CaseStatus::InProgress);
    assert_eq!("UnderAdvisory".parse::<CaseStatus>().unwrap(), CaseStatus::UnderAdvisory);
    assert!(matches!(
      "closed".parse::<CaseStatus>(),
      Err(Error::UnknownStatus(s)) if s == "closed"
    ));
  }

  #[test]
  fn json_accepts_variant_names_and_writes_codes() {
    let status: CaseStatus = serde_json::from_str("\"Archived\"").unwrap();
    assert_eq!(status, CaseStatus::Archived);
    let status: CaseStatus = serde_json::from_str("\"under_advisory\"").unwrap();
    assert_eq!(status, CaseStatus::UnderAdvisory);
    assert_eq!(serde_json::to_string(&CaseStatus::InProgress).unwrap(), "\"in_progress\"");

    let err = serde_json::from_str::<CaseStatus>("\"closed\"").unwrap_err();
    assert!(err.to_string().contains("unknown status code"), "{err}");
  }

  #[test]
  fn codes_round_trip_through_from_str() {
    for status in [
      CaseStatus::InProgress,
      CaseStatus::UnderAdvisory,
      CaseStatus::Delivered,
      CaseStatus::Archived,
      CaseStatus::Paused,
    ] {
      assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
    }
  }

  #[test]
  fn current_is_greatest_sequence_regardless_of_input_order() {
    let ledger = StatusLedger::from_entries(vec![
      entry(3, CaseStatus::InProgress),
      entry(1, CaseStatus::InProgress),
      entry(2, CaseStatus::Archived),
    ]);
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.current_status(), Some(CaseStatus::InProgress));
    assert_eq!(ledger.current().unwrap().sequence, 3);
    let sequences: Vec<_> = ledger.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, [1, 2, 3]);
  }

  #[test]
  fn empty_ledger_has_no_current_status() {
    let ledger = StatusLedger::default();
    assert!(ledger.current().is_none());
    assert!(ledger.is_empty());
  }

  #[test]
  fn change_requires_reason() {
    let change = StatusChange::new(CaseStatus::Archived, "  ", "V-123");
    assert!(matches!(
      change.validate(),
      Err(Error::Validation { ref field, .. }) if field == "reason"
    ));
  }
}
