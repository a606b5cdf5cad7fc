//! Identity of a stored snapshot: which document, and under which principal.
//!
//! A [`SnapshotKey`] names exactly one live snapshot. The principal is either
//! a real user or one of three reserved pseudo-users whose snapshots play a
//! fixed role in the annotation workflow.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Identifier of a project in the metadata store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

/// Identifier of a source document within a project.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for ProjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// A source document, addressed by (project, document).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocumentRef {
  pub project:  ProjectId,
  pub document: DocumentId,
}

impl DocumentRef {
  pub fn new(project: u64, document: u64) -> Self {
    Self { project: ProjectId(project), document: DocumentId(document) }
  }
}

impl fmt::Display for DocumentRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.project, self.document)
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

pub const INITIAL_CAS: &str = "INITIAL_CAS";
pub const CORRECTION_USER: &str = "CORRECTION_USER";
pub const CURATION_USER: &str = "CURATION_USER";

/// The identity under which a snapshot is stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Principal {
  /// A real user; the name is validated on construction.
  User(String),
  /// Output of the one-time conversion of the source file.
  Initial,
  /// Working copy for automatic-suggestion correction.
  Correction,
  /// Merged result of curation.
  Curation,
}

impl Principal {
  /// Build a user principal, rejecting names that would collide with a
  /// reserved principal or escape the annotation folder.
  pub fn user(name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    let reserved = matches!(
      name.as_str(),
      INITIAL_CAS | CORRECTION_USER | CURATION_USER
    );
    let unsafe_path = name.is_empty()
      || name.starts_with('.')
      || name.contains(['/', '\\', '\0']);
    if reserved || unsafe_path {
      return Err(Error::InvalidPrincipal(name));
    }
    Ok(Self::User(name))
  }

  /// The name used as the file stem of this principal's snapshot.
  pub fn as_str(&self) -> &str {
    match self {
      Self::User(name) => name,
      Self::Initial => INITIAL_CAS,
      Self::Correction => CORRECTION_USER,
      Self::Curation => CURATION_USER,
    }
  }

  pub fn is_user(&self) -> bool { matches!(self, Self::User(_)) }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Principal {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      INITIAL_CAS => Ok(Self::Initial),
      CORRECTION_USER => Ok(Self::Correction),
      CURATION_USER => Ok(Self::Curation),
      other => Self::user(other),
    }
  }
}

impl TryFrom<String> for Principal {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<Principal> for String {
  fn from(value: Principal) -> Self { value.as_str().to_owned() }
}

// ─── SnapshotKey ─────────────────────────────────────────────────────────────

/// Names exactly one live snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
  pub document:  DocumentRef,
  pub principal: Principal,
}

impl SnapshotKey {
  pub fn new(document: DocumentRef, principal: Principal) -> Self {
    Self { document, principal }
  }
}

impl fmt::Display for SnapshotKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.document, self.principal)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reserved_names_parse_to_pseudo_principals() {
    assert_eq!("INITIAL_CAS".parse::<Principal>().unwrap(), Principal::Initial);
    assert_eq!(
      "CURATION_USER".parse::<Principal>().unwrap(),
      Principal::Curation
    );
    assert_eq!(
      "alice".parse::<Principal>().unwrap(),
      Principal::User("alice".into())
    );
  }

  #[test]
  fn user_constructor_rejects_reserved_and_path_like_names() {
    for bad in ["", "CORRECTION_USER", "../etc", "a/b", ".hidden", "x\\y"] {
      assert!(
        matches!(Principal::user(bad), Err(Error::InvalidPrincipal(_))),
        "{bad:?} should be rejected"
      );
    }
  }

  #[test]
  fn principal_serializes_as_plain_string() {
    let json = serde_json::to_string(&Principal::Curation).unwrap();
    assert_eq!(json, "\"CURATION_USER\"");
    let back: Principal = serde_json::from_str("\"bob\"").unwrap();
    assert_eq!(back, Principal::User("bob".into()));
  }
}
