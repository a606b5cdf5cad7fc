//! Error types for the annostore codec and migrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("snapshot truncated: need {expected} bytes, have {actual}")]
  Truncated { expected: u64, actual: u64 },

  #[error("not an annostore snapshot (bad magic)")]
  BadMagic,

  #[error("unsupported snapshot format version {0}")]
  UnsupportedVersion(u16),

  #[error("snapshot checksum mismatch: header says {expected}, body hashes to {actual}")]
  ChecksumMismatch { expected: String, actual: String },

  #[error("{0} trailing bytes after snapshot body")]
  TrailingBytes(u64),

  /// JSON has no representation for NaN or infinities.
  #[error("object {object} feature {feature:?} holds a non-finite float")]
  NonFiniteFloat { object: u64, feature: String },

  #[error("snapshot body: {0}")]
  Body(#[from] serde_json::Error),
}

/// Failures of [`crate::migrate`].
#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("target schema is not a superset of the source schema; missing: {}", missing.join(", "))]
  NotSuperset { missing: Vec<String> },

  #[error("object {object} does not conform to the source schema: {reason}")]
  NonConforming { object: u64, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
