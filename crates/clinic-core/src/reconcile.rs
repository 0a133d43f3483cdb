//! Spreadsheet rows for the bulk identity import, and the per-row report.
//!
//! Row checks here are pure. The store runs each valid row in its own
//! transaction and folds every outcome into a [`ReconcileReport`], so one
//! bad row never hides the result of the others.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  person::{ParticipationKind, Role, Sex, normalize_national_id},
};

/// One spreadsheet row as read from the import file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
  /// Spreadsheet row number; the 1-based batch position is used when absent.
  #[serde(default)]
  pub row:           Option<usize>,
  pub id:            Option<String>,
  /// Single `"Last, First"` column, used when the split columns are empty.
  #[serde(default)]
  pub name:          Option<String>,
  #[serde(default)]
  pub first_names:   Option<String>,
  #[serde(default)]
  pub last_names:    Option<String>,
  pub email:         Option<String>,
  #[serde(default)]
  pub phone:         Option<String>,
  #[serde(default)]
  pub sex:           Option<Sex>,
  #[serde(default)]
  pub participation: Option<ParticipationKind>,
}

/// A row that passed every check that needs no store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
  pub id:            String,
  pub first_names:   String,
  pub last_names:    String,
  pub email:         String,
  pub phone:         Option<String>,
  pub sex:           Option<Sex>,
  pub participation: ParticipationKind,
}

impl ImportRow {
  pub fn validate(&self, role: Role) -> Result<ValidatedRow> {
    let id = non_blank(self.id.as_deref())
      .ok_or_else(|| Error::invalid("id", "is required"))?;
    let id = normalize_national_id(id)?;

    let (first_names, last_names) = match (
      non_blank(self.first_names.as_deref()),
      non_blank(self.last_names.as_deref()),
    ) {
      (Some(first), Some(last)) => (first.to_owned(), last.to_owned()),
      _ => {
        let name = non_blank(self.name.as_deref())
          .ok_or_else(|| Error::invalid("name", "is required"))?;
        split_full_name(name)?
      }
    };

    let email = non_blank(self.email.as_deref())
      .ok_or_else(|| Error::invalid("email", "is required"))?;
    check_email(email)?;

    let participation = self
      .participation
      .unwrap_or_else(|| ParticipationKind::default_for(role));
    if !participation.allowed_for(role) {
      return Err(Error::invalid(
        "participation",
        format!("{} is not valid for a {role}", participation.as_str()),
      ));
    }

    Ok(ValidatedRow {
      id,
      first_names,
      last_names,
      email: email.to_lowercase(),
      phone: non_blank(self.phone.as_deref()).map(str::to_owned),
      sex: self.sex,
      participation,
    })
  }
}

/// Split `"Last names, First names"` into `(first, last)`.
pub fn split_full_name(name: &str) -> Result<(String, String)> {
  let (last, first) = name
    .split_once(',')
    .ok_or_else(|| Error::invalid("name", "expected \"Last, First\""))?;
  let (first, last) = (first.trim(), last.trim());
  if first.is_empty() || last.is_empty() {
    return Err(Error::invalid("name", "expected \"Last, First\""));
  }
  Ok((first.to_owned(), last.to_owned()))
}

/// One `@`, no whitespace, and a dotted domain without empty labels.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("static regex")
});

fn check_email(email: &str) -> Result<()> {
  if EMAIL.is_match(email) {
    Ok(())
  } else {
    Err(Error::invalid("email", format!("malformed address {email:?}")))
  }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|s| !s.is_empty())
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
  /// A new identity was created.
  Created,
  /// The identity already existed; its participation was linked or updated.
  Updated,
  Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutcome {
  pub row:    usize,
  /// Normalised id, when the row got far enough to have one.
  pub id:     Option<String>,
  #[serde(flatten)]
  pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
  pub row:    usize,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
  pub created:  usize,
  pub updated:  usize,
  pub errors:   Vec<RowError>,
  /// Every row in submission order.
  pub outcomes: Vec<RowOutcome>,
}

impl ReconcileReport {
  pub fn record(&mut self, outcome: RowOutcome) {
    match &outcome.status {
      RowStatus::Created => self.created += 1,
      RowStatus::Updated => self.updated += 1,
      RowStatus::Error { reason } => self.errors.push(RowError {
        row:    outcome.row,
        reason: reason.clone(),
      }),
    }
    self.outcomes.push(outcome);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(id: &str, name: &str, email: &str) -> ImportRow {
    ImportRow {
      id: Some(id.into()),
      name: Some(name.into()),
      email: Some(email.into()),
      ..Default::default()
    }
  }

  #[test]
  fn full_name_is_split_on_comma() {
    let v = row("12345678", "Pérez González, Ana María", "ana@example.org")
      .validate(Role::Student)
      .unwrap();
    assert_eq!(v.id, "V-12345678");
    assert_eq!(v.first_names, "Ana María");
    assert_eq!(v.last_names, "Pérez González");
    assert_eq!(v.participation, ParticipationKind::Enrolled);
  }

  #[test]
  fn split_columns_win_over_full_name() {
    let mut r = row("V-1", "ignored", "a@b.org");
    r.first_names = Some("Ana".into());
    r.last_names = Some("Pérez".into());
    let v = r.validate(Role::Student).unwrap();
    assert_eq!((v.first_names.as_str(), v.last_names.as_str()), ("Ana", "Pérez"));
  }

  #[test]
  fn name_without_comma_is_rejected() {
    let err = row("V-1", "Ana Pérez", "a@b.org").validate(Role::Student).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));
  }

  #[test]
  fn malformed_id_and_email_are_rejected() {
    let err = row("ABC", "P, A", "a@b.org").validate(Role::Student).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "id"));
    let err = row("V-1", "P, A", "not-an-email").validate(Role::Student).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "email"));
  }

  #[test]
  fn email_shapes() {
    for good in ["ana@clinic.test", "a.b+c@mail.example.org"] {
      assert!(check_email(good).is_ok(), "{good}");
    }
    for bad in ["ana@clinic", "@clinic.test", "ana@.clinic.test", "ana@clinic.test.", "a na@x.org", "a@b@c.org"] {
      assert!(check_email(bad).is_err(), "{bad}");
    }
  }

  #[test]
  fn participation_must_match_role() {
    let mut r = row("V-1", "P, A", "a@b.org");
    r.participation = Some(ParticipationKind::Titular);
    assert!(r.validate(Role::Student).is_err());
    assert_eq!(
      r.validate(Role::Supervisor).unwrap().participation,
      ParticipationKind::Titular
    );
  }

  #[test]
  fn report_counts_outcomes() {
    let mut report = ReconcileReport::default();
    report.record(RowOutcome { row: 1, id: Some("V-1".into()), status: RowStatus::Created });
    report.record(RowOutcome {
      row:    2,
      id:     None,
      status: RowStatus::Error { reason: "bad".into() },
    });
    report.record(RowOutcome { row: 3, id: Some("V-3".into()), status: RowStatus::Updated });
    assert_eq!((report.created, report.updated), (1, 1));
    assert_eq!(report.errors, [RowError { row: 2, reason: "bad".into() }]);
    assert_eq!(report.outcomes.len(), 3);
  }
}
