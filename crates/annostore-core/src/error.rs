//! Error types for `annostore-core`.

use thiserror::Error;

/// Boxed error used at the seams where a collaborator's own error type is
/// not known (format readers, writers, metadata backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid principal name: {0:?}")]
  InvalidPrincipal(String),

  #[error("unsupported feature mode on {feature:?}: {mode}")]
  UnsupportedFeatureMode { feature: String, mode: String },

  #[error("relation layer {0:?} has no attach layer")]
  MissingAttachLayer(String),

  #[error("type {0:?} is already defined differently")]
  ConflictingType(String),

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
