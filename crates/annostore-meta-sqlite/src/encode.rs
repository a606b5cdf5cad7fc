//! Conversions between domain types and SQLite column values.
//!
//! Timestamps are stored as RFC 3339 strings, layer definitions as compact
//! JSON, identifiers as signed 64-bit integers.

use annostore_core::{
  DocumentRef, ProjectId,
  layer::LayerDefinition,
  metadata::{AnnotationDocument, SourceDocument},
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub fn encode_id(id: u64) -> i64 { i64::try_from(id).unwrap_or(i64::MAX) }

pub fn decode_id(raw: i64) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::IdOutOfRange(raw))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Layers ──────────────────────────────────────────────────────────────────

pub fn encode_layer(layer: &LayerDefinition) -> Result<String> {
  Ok(serde_json::to_string(layer)?)
}

pub fn decode_layer(s: &str) -> Result<LayerDefinition> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `source_documents` row.
pub struct RawSourceDocument {
  pub project_id:        i64,
  pub document_id:       i64,
  pub name:              String,
  pub format:            String,
  pub state:             String,
  pub timestamp:         Option<String>,
  pub sentence_accessed: u32,
}

impl RawSourceDocument {
  pub const COLUMNS: &'static str =
    "project_id, document_id, name, format, state, timestamp, sentence_accessed";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      project_id:        row.get(0)?,
      document_id:       row.get(1)?,
      name:              row.get(2)?,
      format:            row.get(3)?,
      state:             row.get(4)?,
      timestamp:         row.get(5)?,
      sentence_accessed: row.get(6)?,
    })
  }

  pub fn into_document(self) -> Result<SourceDocument> {
    Ok(SourceDocument {
      document:          DocumentRef::new(
        decode_id(self.project_id)?,
        decode_id(self.document_id)?,
      ),
      name:              self.name,
      format:            self.format,
      state:             self.state.parse()?,
      timestamp:         self.timestamp.as_deref().map(decode_dt).transpose()?,
      sentence_accessed: self.sentence_accessed,
    })
  }
}

/// Raw values read directly from an `annotation_documents` row.
pub struct RawAnnotationDocument {
  pub user:              String,
  pub state:             String,
  pub timestamp:         Option<String>,
  pub sentence_accessed: u32,
}

impl RawAnnotationDocument {
  pub const COLUMNS: &'static str = "user, state, timestamp, sentence_accessed";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user:              row.get(0)?,
      state:             row.get(1)?,
      timestamp:         row.get(2)?,
      sentence_accessed: row.get(3)?,
    })
  }

  pub fn into_document(self, document: DocumentRef) -> Result<AnnotationDocument> {
    Ok(AnnotationDocument {
      document,
      user: self.user,
      state: self.state.parse()?,
      timestamp: self.timestamp.as_deref().map(decode_dt).transpose()?,
      sentence_accessed: self.sentence_accessed,
    })
  }
}

pub fn project_id(raw: i64) -> Result<ProjectId> { Ok(ProjectId(decode_id(raw)?)) }
