//! The four-level legal classification tree.
//!
//! Subjects are the roots and carry a global id. Every other level is
//! numbered locally within its parent, so a node is only identified by its
//! full ancestor path: category `2` of subject `7` and category `2` of
//! subject `9` are unrelated nodes. Numbers are handed out once and never
//! reassigned, not even after the node holding them is deleted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type SubjectId = i64;

/// A sibling-scoped number below the subject level.
pub type LocalNumber = u32;

const MAX_NAME_LEN: usize = 200;

// ─── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:   SubjectId,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub subject_id: SubjectId,
  pub number:     LocalNumber,
  pub name:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
  pub subject_id:      SubjectId,
  pub category_number: LocalNumber,
  pub number:          LocalNumber,
  pub name:            String,
}

/// A leaf of the tree. Cases are filed under exactly one legal scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalScope {
  pub subject_id:         SubjectId,
  pub category_number:    LocalNumber,
  pub subcategory_number: LocalNumber,
  pub number:             LocalNumber,
  pub name:               String,
}

impl Category {
  pub fn path(&self) -> CategoryPath {
    CategoryPath { subject_id: self.subject_id, category: self.number }
  }
}

impl Subcategory {
  pub fn path(&self) -> SubcategoryPath {
    SubcategoryPath {
      subject_id:  self.subject_id,
      category:    self.category_number,
      subcategory: self.number,
    }
  }
}

impl LegalScope {
  pub fn path(&self) -> LegalScopePath {
    LegalScopePath {
      subject_id:  self.subject_id,
      category:    self.category_number,
      subcategory: self.subcategory_number,
      scope:       self.number,
    }
  }
}

// ─── Paths ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryPath {
  pub subject_id: SubjectId,
  pub category:   LocalNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubcategoryPath {
  pub subject_id:  SubjectId,
  pub category:    LocalNumber,
  pub subcategory: LocalNumber,
}

/// The full 4-tuple a case refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegalScopePath {
  pub subject_id:  SubjectId,
  pub category:    LocalNumber,
  pub subcategory: LocalNumber,
  pub scope:       LocalNumber,
}

impl SubcategoryPath {
  pub fn parent(&self) -> CategoryPath {
    CategoryPath { subject_id: self.subject_id, category: self.category }
  }
}

impl LegalScopePath {
  pub fn new(
    subject_id: SubjectId,
    category: LocalNumber,
    subcategory: LocalNumber,
    scope: LocalNumber,
  ) -> Self {
    Self { subject_id, category, subcategory, scope }
  }

  pub fn parent(&self) -> SubcategoryPath {
    SubcategoryPath {
      subject_id:  self.subject_id,
      category:    self.category,
      subcategory: self.subcategory,
    }
  }
}

/// Any node of the tree, addressed by its full path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum NodePath {
  Subject { subject_id: SubjectId },
  Category(CategoryPath),
  Subcategory(SubcategoryPath),
  LegalScope(LegalScopePath),
}

impl fmt::Display for NodePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Subject { subject_id } => write!(f, "{subject_id}"),
      Self::Category(p) => write!(f, "{}.{}", p.subject_id, p.category),
      Self::Subcategory(p) => {
        write!(f, "{}.{}.{}", p.subject_id, p.category, p.subcategory)
      }
      Self::LegalScope(p) => write!(
        f,
        "{}.{}.{}.{}",
        p.subject_id, p.category, p.subcategory, p.scope
      ),
    }
  }
}

impl From<CategoryPath> for NodePath {
  fn from(p: CategoryPath) -> Self { Self::Category(p) }
}

impl From<SubcategoryPath> for NodePath {
  fn from(p: SubcategoryPath) -> Self { Self::Subcategory(p) }
}

impl From<LegalScopePath> for NodePath {
  fn from(p: LegalScopePath) -> Self { Self::LegalScope(p) }
}

// ─── Resolved leaf ───────────────────────────────────────────────────────────

/// A legal scope together with the names of every ancestor, as shown next to
/// a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLegalScope {
  pub path:        LegalScopePath,
  pub subject:     String,
  pub category:    String,
  pub subcategory: String,
  pub legal_scope: String,
}

/// Trim a node name and reject empty or oversized ones.
pub fn normalize_node_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::invalid("name", "must not be empty"));
  }
  if name.chars().count() > MAX_NAME_LEN {
    return Err(Error::invalid(
      "name",
      format!("must be at most {MAX_NAME_LEN} characters"),
    ));
  }
  Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn node_path_display_walks_full_ancestry() {
    let leaf = LegalScopePath::new(3, 1, 2, 4);
    assert_eq!(NodePath::from(leaf).to_string(), "3.1.2.4");
    assert_eq!(NodePath::from(leaf.parent()).to_string(), "3.1.2");
    assert_eq!(NodePath::from(leaf.parent().parent()).to_string(), "3.1");
    assert_eq!(NodePath::Subject { subject_id: 3 }.to_string(), "3");
  }

  #[test]
  fn node_names_are_trimmed() {
    assert_eq!(normalize_node_name("  Labor  ").unwrap(), "Labor");
  }

  #[test]
  fn blank_node_name_is_rejected() {
    let err = normalize_node_name("   ").unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));
  }
}
