//! Built-in format reader and writer, and the registry formats are looked
//! up in by identifier.

use std::{collections::HashMap, sync::Arc};

use annostore_core::{AnnotationState, BoxError, FormatReader, FormatWriter, Schema, Snapshot};

use crate::{Error, Result};

// ─── Plain text ──────────────────────────────────────────────────────────────

/// Reads UTF-8 text verbatim. Segmentation is added by the repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextReader;

impl FormatReader for PlainTextReader {
  fn format_id(&self) -> &str { "text" }

  fn convert(&self, raw: &[u8], _schema: &Schema) -> Result<AnnotationState, BoxError> {
    let text = std::str::from_utf8(raw)?;
    Ok(AnnotationState::new(text))
  }
}

// ─── JSON ────────────────────────────────────────────────────────────────────

/// Writes the snapshot (schema and state) as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl FormatWriter for JsonWriter {
  fn format_id(&self) -> &str { "json" }

  fn extension(&self) -> &str { "json" }

  fn write(&self, snapshot: &Snapshot) -> Result<Vec<u8>, BoxError> {
    Ok(serde_json::to_vec_pretty(snapshot)?)
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FormatRegistry {
  readers: HashMap<String, Arc<dyn FormatReader>>,
  writers: HashMap<String, Arc<dyn FormatWriter>>,
}

impl FormatRegistry {
  pub fn new() -> Self { Self::default() }

  /// A registry with the built-in `text` reader and `json` writer.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    registry.register_reader(Arc::new(PlainTextReader));
    registry.register_writer(Arc::new(JsonWriter));
    registry
  }

  pub fn register_reader(&mut self, reader: Arc<dyn FormatReader>) {
    self.readers.insert(reader.format_id().to_owned(), reader);
  }

  pub fn register_writer(&mut self, writer: Arc<dyn FormatWriter>) {
    self.writers.insert(writer.format_id().to_owned(), writer);
  }

  pub fn reader(&self, format: &str) -> Result<Arc<dyn FormatReader>> {
    self
      .readers
      .get(format)
      .cloned()
      .ok_or_else(|| Error::UnknownFormat(format.to_owned()))
  }

  pub fn writer(&self, format: &str) -> Result<Arc<dyn FormatWriter>> {
    self
      .writers
      .get(format)
      .cloned()
      .ok_or_else(|| Error::UnknownFormat(format.to_owned()))
  }
}
