//! Snapshot codec and schema migrator for annostore.
//!
//! Converts between annotation states and self-describing byte blobs that
//! embed the schema they were written under. Pure synchronous; no filesystem
//! dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use annostore_codec::{decode, encode};
//! use annostore_core::{AnnotationState, Schema};
//!
//! let state = AnnotationState::new("Hello world");
//! let bytes = encode(&state, &Schema::builtin()).unwrap();
//! let (back, schema) = decode(&bytes).unwrap();
//! assert_eq!(back, state);
//! assert_eq!(schema, Schema::builtin());
//! ```

pub mod error;
mod migrate;
mod transport;
mod wire;

use annostore_core::{AnnotationState, Schema, Snapshot};
pub use error::{Error, Result, SchemaError};
pub use migrate::{migrate, upgrade};
pub use wire::{FORMAT_VERSION, HEADER_LEN, MAGIC};

// ─── Public API ──────────────────────────────────────────────────────────────

/// Serialize `state` together with the schema it conforms to.
pub fn encode(state: &AnnotationState, schema: &Schema) -> Result<Vec<u8>> {
  wire::encode(state, schema)
}

/// Deserialize a blob produced by [`encode`], returning the state and the
/// schema embedded in it.
pub fn decode(bytes: &[u8]) -> Result<(AnnotationState, Schema)> {
  wire::decode(bytes)
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
  wire::encode(&snapshot.state, &snapshot.schema)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
  let (state, schema) = wire::decode(bytes)?;
  Ok(Snapshot::new(schema, state))
}

#[cfg(test)]
mod tests;
