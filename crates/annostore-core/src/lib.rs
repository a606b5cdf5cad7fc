//! Core types and trait definitions for the annostore persistence engine.
//!
//! This crate is deliberately free of filesystem and database dependencies.
//! All other crates depend on it; the snapshot store, the codec, and the
//! metadata backends only ever meet through the types defined here.

pub mod error;
pub mod format;
pub mod key;
pub mod layer;
pub mod metadata;
pub mod schema;
pub mod state;
pub mod validate;

pub use error::{BoxError, Error, Result};
pub use format::{FormatReader, FormatWriter};
pub use key::{DocumentId, DocumentRef, Principal, ProjectId, SnapshotKey};
pub use metadata::MetadataStore;
pub use schema::Schema;
pub use state::{AnnotationState, Snapshot};
pub use validate::{ValidationError, Validator};
