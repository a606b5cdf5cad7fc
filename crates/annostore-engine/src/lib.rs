//! `annostore-engine`: the persistence facade over the snapshot store and
//! the metadata database, plus the `annostore` command-line tool.
//!
//! [`Repository`] is what the annotation workflow calls: it imports source
//! documents, opens and saves per-principal snapshots, upgrades them to the
//! current project schema and exports them through a [`FormatRegistry`].

pub mod config;
pub mod error;
pub mod formats;
pub mod repository;
pub mod segment;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use formats::{FormatRegistry, JsonWriter, PlainTextReader};
pub use repository::{Export, Repository, UpgradeOutcome};
