//! Term-scoped links between people and cases.
//!
//! Assignments are never deleted. Replacing a supervisor flips the previous
//! row to inactive in the same transaction that inserts the new one, so the
//! history of who supervised a case stays queryable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, case::CaseNumber, person::Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub case_number: CaseNumber,
  pub person_id:   String,
  pub term:        String,
  pub role:        Role,
  pub active:      bool,
  pub assigned_at: DateTime<Utc>,
  /// Set when the row stopped being active.
  pub released_at: Option<DateTime<Utc>>,
}

/// What an assign call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
  Created { assignment: Assignment },
  /// The person was already active in that role; nothing was written.
  Unchanged { assignment: Assignment },
  /// A new supervisor replaced the previously active one.
  Superseded {
    assignment: Assignment,
    previous:   Assignment,
  },
}

impl AssignmentOutcome {
  pub fn assignment(&self) -> &Assignment {
    match self {
      Self::Created { assignment }
      | Self::Unchanged { assignment }
      | Self::Superseded { assignment, .. } => assignment,
    }
  }
}

/// The optional initial staffing submitted with a new case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
  pub term:       String,
  #[serde(default)]
  pub students:   Vec<String>,
  #[serde(default)]
  pub supervisor: Option<String>,
}

impl AssignmentRequest {
  pub fn validate(&self) -> Result<()> {
    if self.term.trim().is_empty() {
      return Err(Error::invalid("assignment.term", "must not be empty"));
    }
    for (i, student) in self.students.iter().enumerate() {
      if student.trim().is_empty() {
        return Err(Error::invalid(
          format!("assignment.students[{i}]"),
          "must not be empty",
        ));
      }
      if self.supervisor.as_deref() == Some(student.as_str()) {
        return Err(Error::invalid(
          format!("assignment.students[{i}]"),
          "cannot also be the supervisor",
        ));
      }
    }
    if let Some(supervisor) = &self.supervisor
      && supervisor.trim().is_empty()
    {
      return Err(Error::invalid("assignment.supervisor", "must not be empty"));
    }
    Ok(())
  }

  /// Every requested `(person, role, field)` with duplicate students dropped.
  pub fn people(&self) -> Vec<(&str, Role, String)> {
    let mut seen = Vec::new();
    let mut people = Vec::new();
    for (i, student) in self.students.iter().enumerate() {
      let student = student.trim();
      if seen.contains(&student) {
        continue;
      }
      seen.push(student);
      people.push((student, Role::Student, format!("assignment.students[{i}]")));
    }
    if let Some(supervisor) = &self.supervisor {
      people.push((supervisor.trim(), Role::Supervisor, "assignment.supervisor".to_owned()));
    }
    people
  }
}
