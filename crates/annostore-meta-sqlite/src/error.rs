//! Error type for `annostore-meta-sqlite`.

use annostore_core::{DocumentRef, ProjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] annostore_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("identifier out of range: {0}")]
  IdOutOfRange(i64),

  #[error("project not found: {0}")]
  ProjectNotFound(ProjectId),

  #[error("document not found: {0}")]
  DocumentNotFound(DocumentRef),

  #[error("layer {name:?} already exists in project {project}")]
  DuplicateLayer { project: ProjectId, name: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
