//! The `MetadataStore` trait and the relational records it manages.
//!
//! The metadata store is owned elsewhere; the persistence facade only ever
//! updates it after the snapshot store reported success. Implemented by
//! `annostore-meta-sqlite`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  key::{DocumentRef, ProjectId},
  layer::LayerDefinition,
};

// ─── States ──────────────────────────────────────────────────────────────────

/// Workflow state of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDocumentState {
  New,
  AnnotationInProgress,
  AnnotationFinished,
  CurationInProgress,
  CurationFinished,
}

impl SourceDocumentState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::New => "new",
      Self::AnnotationInProgress => "annotation_in_progress",
      Self::AnnotationFinished => "annotation_finished",
      Self::CurationInProgress => "curation_in_progress",
      Self::CurationFinished => "curation_finished",
    }
  }
}

impl FromStr for SourceDocumentState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "new" => Ok(Self::New),
      "annotation_in_progress" => Ok(Self::AnnotationInProgress),
      "annotation_finished" => Ok(Self::AnnotationFinished),
      "curation_in_progress" => Ok(Self::CurationInProgress),
      "curation_finished" => Ok(Self::CurationFinished),
      other => Err(Error::UnknownDiscriminant {
        kind:  "source document state",
        value: other.to_owned(),
      }),
    }
  }
}

/// Workflow state of one user's annotations on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationDocumentState {
  New,
  InProgress,
  Finished,
  Ignore,
}

impl AnnotationDocumentState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::New => "new",
      Self::InProgress => "in_progress",
      Self::Finished => "finished",
      Self::Ignore => "ignore",
    }
  }
}

impl FromStr for AnnotationDocumentState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "new" => Ok(Self::New),
      "in_progress" => Ok(Self::InProgress),
      "finished" => Ok(Self::Finished),
      "ignore" => Ok(Self::Ignore),
      other => Err(Error::UnknownDiscriminant {
        kind:  "annotation document state",
        value: other.to_owned(),
      }),
    }
  }
}

impl fmt::Display for SourceDocumentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for AnnotationDocumentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
  pub document:          DocumentRef,
  /// Original file name; the stored source file keeps this name.
  pub name:              String,
  /// Identifier of the format reader able to convert the source file.
  pub format:            String,
  pub state:             SourceDocumentState,
  /// Last time curation saved this document.
  pub timestamp:         Option<DateTime<Utc>>,
  pub sentence_accessed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDocument {
  pub document:          DocumentRef,
  pub user:              String,
  pub state:             AnnotationDocumentState,
  /// Last time the user saved this document.
  pub timestamp:         Option<DateTime<Utc>>,
  pub sentence_accessed: u32,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational metadata backend.
///
/// Calls are synchronous; backends that wrap a connection are expected to
/// serialise access internally so the trait can be shared across threads.
pub trait MetadataStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve a source document. Returns `None` if not found.
  fn get_document(&self, document: DocumentRef)
  -> Result<Option<SourceDocument>, Self::Error>;

  /// The layer definitions of a project, in creation order.
  fn list_layers(
    &self,
    project: ProjectId,
  ) -> Result<Vec<LayerDefinition>, Self::Error>;

  fn annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
  ) -> Result<Option<AnnotationDocument>, Self::Error>;

  /// Create the annotation document for `user` in state `New`. Creating one
  /// that already exists returns the existing row.
  fn create_annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
  ) -> Result<AnnotationDocument, Self::Error>;

  fn set_document_state(
    &self,
    document: DocumentRef,
    state: SourceDocumentState,
  ) -> Result<(), Self::Error>;

  /// Record that curation saved the document at `at`.
  fn touch_document(
    &self,
    document: DocumentRef,
    at: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Record that `user` saved the document at `at`, moving the annotation
  /// document to `state`.
  fn touch_annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
    at: DateTime<Utc>,
    state: AnnotationDocumentState,
  ) -> Result<(), Self::Error>;

  /// Delete the source document row together with its annotation documents.
  fn remove_document(&self, document: DocumentRef) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn states_round_trip_through_their_names() {
    for state in [
      SourceDocumentState::New,
      SourceDocumentState::AnnotationInProgress,
      SourceDocumentState::CurationFinished,
    ] {
      assert_eq!(state.as_str().parse::<SourceDocumentState>().unwrap(), state);
    }
    assert_eq!(
      "in_progress".parse::<AnnotationDocumentState>().unwrap(),
      AnnotationDocumentState::InProgress
    );
    assert!(matches!(
      "done".parse::<AnnotationDocumentState>(),
      Err(Error::UnknownDiscriminant { .. })
    ));
  }
}
