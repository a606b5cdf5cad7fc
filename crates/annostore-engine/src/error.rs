//! Error type for the persistence facade.

use annostore_core::{BoxError, DocumentRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[from] annostore_store_fs::Error),

  #[error("schema error: {0}")]
  Schema(#[from] annostore_codec::SchemaError),

  #[error("core error: {0}")]
  Core(#[from] annostore_core::Error),

  #[error("metadata error: {0}")]
  Metadata(#[source] BoxError),

  #[error("document not found: {0}")]
  DocumentNotFound(DocumentRef),

  #[error("unknown format: {0:?}")]
  UnknownFormat(String),

  /// Converting a source file into its initial snapshot failed.
  #[error("import of {document} failed: {source}")]
  ImportFailed {
    document: DocumentRef,
    #[source]
    source:   BoxError,
  },

  #[error("export failed: {0}")]
  Export(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
