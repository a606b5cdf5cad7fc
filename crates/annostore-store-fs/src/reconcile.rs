//! Startup repair of interrupted replace sequences.
//!
//! A crash between renaming the live snapshot to its backup and finishing
//! the new write leaves a `.old` file behind. Reconciliation decides, per key,
//! which of the two files is authoritative.

use std::{
  io,
  path::{Path, PathBuf},
};

use annostore_core::{DocumentRef, SnapshotKey};
use tracing::{info, warn};

use crate::{Error, Result, SnapshotStore, layout::FileKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
  /// Only the backup existed; it became the live snapshot again.
  Restored,
  /// The live snapshot decodes; the stale backup was deleted.
  DiscardedBackup,
  /// The live snapshot was unreadable; the backup replaced it.
  RolledBack,
  /// No backup; nothing to do.
  Clean,
}

impl SnapshotStore {
  /// Reconcile a single key.
  pub fn reconcile(&self, key: &SnapshotKey) -> Result<Reconciliation> {
    self.guard.with(key, || self.reconcile_locked(key))
  }

  /// Reconcile every key in the repository that has a backup file. Returns
  /// the keys that needed work.
  pub fn reconcile_all(&self) -> Result<Vec<(SnapshotKey, Reconciliation)>> {
    let mut done = Vec::new();
    for doc in self.documents()? {
      for (principal, kind, _) in self.annotation_files(doc)? {
        if kind != FileKind::Backup {
          continue;
        }
        let key = SnapshotKey::new(doc, principal);
        let outcome = self.reconcile(&key)?;
        if outcome != Reconciliation::Clean {
          done.push((key, outcome));
        }
      }
    }
    info!(repaired = done.len(), "repository reconciled");
    Ok(done)
  }

  fn reconcile_locked(&self, key: &SnapshotKey) -> Result<Reconciliation> {
    let live = self.layout.live_path(key);
    let backup = self.layout.backup_path(key);
    if !self.fs.exists(&backup) {
      return Ok(Reconciliation::Clean);
    }

    let outcome = if !self.fs.exists(&live) {
      self.fs.rename(&backup, &live).map_err(Error::io(&backup))?;
      Reconciliation::Restored
    } else {
      match self.decode_file(&live) {
        Ok(_) => {
          self.fs.remove_file(&backup).map_err(Error::io(&backup))?;
          Reconciliation::DiscardedBackup
        }
        Err(e) => {
          warn!(key = %key, error = %e, "live snapshot unreadable, rolling back");
          self.fs.rename(&backup, &live).map_err(Error::io(&backup))?;
          Reconciliation::RolledBack
        }
      }
    };
    info!(key = %key, outcome = ?outcome, "snapshot reconciled");
    Ok(outcome)
  }

  /// Every document folder under the repository root.
  fn documents(&self) -> Result<Vec<DocumentRef>> {
    let mut docs = Vec::new();
    for project_dir in self.list_dir(&self.layout.projects_dir())? {
      let Some(project) = numeric_name(&project_dir) else { continue };
      for doc_dir in self.list_dir(&project_dir.join("document"))? {
        let Some(document) = numeric_name(&doc_dir) else { continue };
        docs.push(DocumentRef::new(project, document));
      }
    }
    docs.sort();
    Ok(docs)
  }

  fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
    match self.fs.read_dir(dir) {
      Ok(paths) => Ok(paths),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
      Err(e) => Err(Error::Io { path: dir.to_owned(), source: e }),
    }
  }
}

fn numeric_name(path: &Path) -> Option<u64> {
  path.file_name()?.to_str()?.parse().ok()
}
