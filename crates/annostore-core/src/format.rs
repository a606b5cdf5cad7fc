//! Format reader and writer traits.
//!
//! Readers turn a raw source file into an initial annotation state; writers
//! turn a snapshot into an exported file. Concrete formats live outside this
//! crate and are looked up by identifier.

use crate::{BoxError, Schema, Snapshot, state::AnnotationState};

pub trait FormatReader: Send + Sync {
  /// Identifier stored as the source document's format.
  fn format_id(&self) -> &str;

  /// Convert raw source bytes into a state whose objects conform to `schema`.
  fn convert(&self, raw: &[u8], schema: &Schema) -> Result<AnnotationState, BoxError>;
}

pub trait FormatWriter: Send + Sync {
  fn format_id(&self) -> &str;

  /// File extension of exported files, without the leading dot.
  fn extension(&self) -> &str;

  fn write(&self, snapshot: &Snapshot) -> Result<Vec<u8>, BoxError>;
}
