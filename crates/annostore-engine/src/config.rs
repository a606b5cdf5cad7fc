//! Engine configuration, layered from an optional TOML file and
//! `ANNOSTORE_*` environment variables.

use std::path::{Path, PathBuf};

use annostore_store_fs::{
  DEFAULT_EXTENSION, HistoryConfig, LockScope, RetentionPolicy, SnapshotStore,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Root directory of the snapshot repository.
  pub repository:         PathBuf,
  /// SQLite database holding projects, layers and documents.
  pub metadata_path:      PathBuf,
  pub snapshot_extension: String,
  pub lock_scope:         LockScope,
  pub history:            HistoryConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      repository:         PathBuf::from("./repository"),
      metadata_path:      PathBuf::from("./annostore.db"),
      snapshot_extension: DEFAULT_EXTENSION.to_owned(),
      lock_scope:         LockScope::default(),
      history:            HistoryConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Load from `path` (which may be missing) with environment overrides,
  /// e.g. `ANNOSTORE_HISTORY__KEEP_COUNT=5`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ANNOSTORE")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  /// A snapshot store configured from these settings. The validator is
  /// installed by the repository.
  pub fn snapshot_store(&self) -> annostore_store_fs::Result<SnapshotStore> {
    Ok(
      SnapshotStore::new(&self.repository)
        .with_extension(&self.snapshot_extension)?
        .with_lock_scope(self.lock_scope)
        .with_retention(RetentionPolicy::from(self.history)),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, EngineConfig::default());
    assert_eq!(cfg.history.interval, -1);
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annostore.toml");
    std::fs::write(
      &path,
      "repository = \"/srv/repo\"\nlock_scope = \"global\"\n\n[history]\ninterval = 0\nkeep_count = 3\n",
    )
    .unwrap();

    let cfg = EngineConfig::load(&path).unwrap();
    assert_eq!(cfg.repository, PathBuf::from("/srv/repo"));
    assert_eq!(cfg.lock_scope, LockScope::Global);
    assert_eq!(cfg.history, HistoryConfig { interval: 0, keep_count: 3, keep_age: 0 });
    assert_eq!(cfg.snapshot_extension, "ser");
  }

  #[test]
  fn reserved_extension_is_refused() {
    let cfg = EngineConfig { snapshot_extension: "old".into(), ..EngineConfig::default() };
    assert!(matches!(
      cfg.snapshot_store(),
      Err(annostore_store_fs::Error::InvalidExtension(ext)) if ext == "old"
    ));
    assert!(EngineConfig::default().snapshot_store().is_ok());
  }
}
