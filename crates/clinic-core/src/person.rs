//! People known to the clinic: identities, their term participations, and
//! the actor passed into privileged operations.

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Supervisor,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Student => "student",
      Self::Supervisor => "supervisor",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
  Female,
  Male,
}

// ─── Participation ───────────────────────────────────────────────────────────

/// How a person takes part in one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationKind {
  // students
  Enrolled,
  Graduate,
  // supervisors
  Titular,
  Advisor,
  // either
  Volunteer,
}

impl ParticipationKind {
  pub fn default_for(role: Role) -> Self {
    match role {
      Role::Student => Self::Enrolled,
      Role::Supervisor => Self::Titular,
    }
  }

  pub fn allowed_for(self, role: Role) -> bool {
    match self {
      Self::Volunteer => true,
      Self::Enrolled | Self::Graduate => role == Role::Student,
      Self::Titular | Self::Advisor => role == Role::Supervisor,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Enrolled => "enrolled",
      Self::Graduate => "graduate",
      Self::Titular => "titular",
      Self::Advisor => "advisor",
      Self::Volunteer => "volunteer",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
  pub identity_id: String,
  pub term:        String,
  pub kind:        ParticipationKind,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A student or supervisor, keyed by national ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id:          String,
  pub first_names: String,
  pub last_names:  String,
  pub email:       String,
  pub phone:       Option<String>,
  pub sex:         Option<Sex>,
  pub role:        Role,
  pub created_at:  DateTime<Utc>,
}

/// A person eligible for assignment in a term, as listed for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePerson {
  pub identity:      Identity,
  pub participation: ParticipationKind,
}

// ─── National IDs ────────────────────────────────────────────────────────────

static NATIONAL_ID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?i:([VE])\s*-?\s*)?(\d{1,10})$").expect("static regex")
});

/// Normalise a national ID to `V-12345678` form.
///
/// Accepts an optional nationality letter (`V` or `E`, any case, `V` when
/// absent), an optional dash, and 1–10 digits; dots used as thousands
/// separators are ignored.
pub fn normalize_national_id(raw: &str) -> Result<String> {
  let compact: String = raw.trim().chars().filter(|c| *c != '.').collect();
  let caps = NATIONAL_ID
    .captures(&compact)
    .ok_or_else(|| Error::invalid("id", format!("malformed national id {raw:?}")))?;
  let nationality = caps
    .get(1)
    .map_or('V', |m| m.as_str().chars().next().unwrap_or('V'))
    .to_ascii_uppercase();
  Ok(format!("{nationality}-{}", &caps[2]))
}

// ─── Terms ───────────────────────────────────────────────────────────────────

/// An academic term from the term catalog, e.g. `2025-15`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
  pub code:      String,
  pub starts_on: NaiveDate,
  pub ends_on:   NaiveDate,
}

impl Term {
  pub fn validate(&self) -> Result<()> {
    if self.code.trim().is_empty() {
      return Err(Error::invalid("code", "must not be empty"));
    }
    if self.ends_on < self.starts_on {
      return Err(Error::invalid("ends_on", "must not precede starts_on"));
    }
    Ok(())
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
  #[default]
  Standard,
  Elevated,
}

/// Who is calling. Authentication happens upstream; the core only checks the
/// asserted privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub person_id: String,
  #[serde(default)]
  pub privilege: Privilege,
}

impl Actor {
  pub fn new(person_id: impl Into<String>, privilege: Privilege) -> Self {
    Self { person_id: person_id.into(), privilege }
  }

  pub fn require_elevated(&self, action: &str) -> Result<()> {
    match self.privilege {
      Privilege::Elevated => Ok(()),
      Privilege::Standard => Err(Error::Forbidden(format!(
        "{} may not {action}",
        self.person_id
      ))),
    }
  }
}
