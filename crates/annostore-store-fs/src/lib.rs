//! Filesystem-backed versioned snapshot store for annostore.
//!
//! Keeps one live snapshot file per (document, principal), replaces it
//! atomically with rollback on failure, archives superseded versions into a
//! bounded history and repairs interrupted writes on startup.

pub mod error;
pub mod fs;
pub mod guard;
pub mod layout;
mod reconcile;
pub mod retention;
mod source;
mod store;

pub use error::{Error, Result};
pub use fs::{Filesystem, StdFilesystem};
pub use guard::LockScope;
pub use reconcile::Reconciliation;
pub use retention::{HistoryConfig, HistoryEntry, RetentionOutcome, RetentionPolicy};
pub use store::{DEFAULT_EXTENSION, SnapshotStore};
