//! SQLite backend for annostore's project and document metadata.
//!
//! Implements [`annostore_core::MetadataStore`] over a synchronous
//! [`rusqlite`] connection guarded by a mutex, plus the administrative calls
//! (projects, layers, documents) the command-line tool needs.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteMetadata;

#[cfg(test)]
mod tests;
