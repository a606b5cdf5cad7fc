//! Error type for `annostore-store-fs`.

use std::{io, path::PathBuf};

use annostore_core::{SnapshotKey, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] annostore_core::Error),

  #[error("no live snapshot for {0}")]
  NotFound(SnapshotKey),

  #[error("snapshot at {} cannot be decoded: {source}", path.display())]
  CorruptSnapshot {
    path:   PathBuf,
    #[source]
    source: annostore_codec::Error,
  },

  #[error(transparent)]
  ValidationFailed(#[from] ValidationError),

  /// The atomic replace failed; the previous live snapshot is still in place.
  #[error("writing {} failed: {source}", path.display())]
  WriteFailed {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("encoding snapshot: {0}")]
  Encode(#[source] annostore_codec::Error),

  #[error("no history entry {timestamp} for {key}")]
  HistoryNotFound { key: SnapshotKey, timestamp: i64 },

  #[error("source file {name:?} not found in {document}")]
  SourceNotFound {
    document: annostore_core::DocumentRef,
    name:     String,
  },

  #[error("invalid source file name: {0:?}")]
  InvalidSourceName(String),

  #[error("invalid snapshot extension: {0:?}")]
  InvalidExtension(String),

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }

  pub(crate) fn write_failed(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::WriteFailed { path, source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
