//! [`SnapshotStore`]: one live snapshot file per key, replaced atomically.

use std::{
  io,
  path::{Path, PathBuf},
  sync::Arc,
};

use annostore_codec::{decode_snapshot, encode_snapshot};
use annostore_core::{
  DocumentRef, Principal, Snapshot, SnapshotKey, Validator, validate::NoopValidator,
};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  fs::{Filesystem, StdFilesystem},
  guard::{Guard, LockScope},
  layout::{FileKind, Layout},
  retention::{HistoryEntry, Pass, RetentionOutcome, RetentionPolicy},
};

pub const DEFAULT_EXTENSION: &str = "ser";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Versioned snapshot storage rooted at a repository directory.
///
/// Every read and write of a key runs under the [`Guard`], including the
/// validator callbacks and the retention pass that follows a write.
pub struct SnapshotStore {
  pub(crate) layout:    Layout,
  pub(crate) fs:        Arc<dyn Filesystem>,
  pub(crate) guard:     Guard,
  pub(crate) retention: RetentionPolicy,
  pub(crate) validator: Arc<dyn Validator>,
}

impl SnapshotStore {
  /// A store rooted at `root` with the default extension, no history,
  /// per-key locking and no validation.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      layout:    Layout::with_default_extension(root),
      fs:        Arc::new(StdFilesystem),
      guard:     Guard::new(LockScope::default()),
      retention: RetentionPolicy::disabled(),
      validator: Arc::new(NoopValidator),
    }
  }

  /// Fails with [`Error::InvalidExtension`] for an empty extension, one
  /// containing a dot or a separator, and the reserved `old` and `bak`.
  pub fn with_extension(mut self, extension: &str) -> Result<Self> {
    self.layout = Layout::new(self.layout.root().to_owned(), extension)?;
    Ok(self)
  }

  pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
    self.retention = retention;
    self
  }

  pub fn with_lock_scope(mut self, scope: LockScope) -> Self {
    self.guard = Guard::new(scope);
    self
  }

  pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
    self.validator = validator;
    self
  }

  pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
    self.fs = fs;
    self
  }

  pub fn layout(&self) -> &Layout { &self.layout }

  pub fn validator(&self) -> &Arc<dyn Validator> { &self.validator }

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Whether a live snapshot exists. Advisory only; takes no lock.
  pub fn exists(&self, key: &SnapshotKey) -> bool {
    self.fs.exists(&self.layout.live_path(key))
  }

  /// Read and repair the live snapshot of `key`.
  pub fn read(&self, key: &SnapshotKey) -> Result<Snapshot> {
    self.guard.with(key, || self.read_locked(key))
  }

  /// Replace the live snapshot of `key` with `snapshot`.
  ///
  /// The validator's `analyze` runs first and aborts the write on failure.
  /// If the write itself fails the previous snapshot is put back and
  /// [`Error::WriteFailed`] is returned. History retention runs after a
  /// successful replace; its failures only show up in the outcome.
  pub fn write(&self, key: &SnapshotKey, snapshot: &Snapshot) -> Result<RetentionOutcome> {
    self.guard.with(key, || self.write_locked(key, snapshot))
  }

  /// Read the live snapshot of `key`, or build one with `create` and write
  /// it if there is none. The check and the write happen under one lock, so
  /// `create` runs at most once per key and never replaces a snapshot that
  /// appeared concurrently.
  pub fn read_or_create<E>(
    &self,
    key: &SnapshotKey,
    create: impl FnOnce() -> Result<Snapshot, E>,
  ) -> Result<Snapshot, E>
  where
    E: From<Error>,
  {
    self.guard.with(key, || {
      match self.read_locked(key) {
        Err(Error::NotFound(_)) => {}
        other => return other.map_err(E::from),
      }
      let snapshot = create()?;
      self.write_locked(key, &snapshot)?;
      debug!(key = %key, "snapshot created");
      Ok(snapshot)
    })
  }

  /// Delete the live snapshot and any stale backup. History is kept.
  /// Returns whether a live snapshot existed.
  pub fn remove(&self, key: &SnapshotKey) -> Result<bool> {
    self.guard.with(key, || {
      let live = self.layout.live_path(key);
      let existed = remove_if_present(self.fs.as_ref(), &live)?;
      remove_if_present(self.fs.as_ref(), &self.layout.backup_path(key))?;
      if existed {
        info!(key = %key, "snapshot removed");
      }
      Ok(existed)
    })
  }

  /// Principals with a live snapshot for `doc`, sorted.
  pub fn principals(&self, doc: DocumentRef) -> Result<Vec<Principal>> {
    let mut principals: Vec<_> = self
      .annotation_files(doc)?
      .into_iter()
      .filter_map(|(principal, kind, _)| (kind == FileKind::Live).then_some(principal))
      .collect();
    principals.sort();
    Ok(principals)
  }

  pub(crate) fn read_locked(&self, key: &SnapshotKey) -> Result<Snapshot> {
    let path = self.layout.live_path(key);
    let mut snapshot = self.decode_file(&path).map_err(|e| match e {
      Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
        Error::NotFound(key.clone())
      }
      other => other,
    })?;
    self.validator.repair(&mut snapshot)?;
    debug!(
      project = %key.document.project,
      document = %key.document.document,
      principal = %key.principal,
      "snapshot read"
    );
    Ok(snapshot)
  }

  pub(crate) fn write_locked(
    &self,
    key: &SnapshotKey,
    snapshot: &Snapshot,
  ) -> Result<RetentionOutcome> {
    self.validator.analyze(snapshot)?;
    let bytes = encode_snapshot(snapshot).map_err(Error::Encode)?;

    let dir = self.layout.annotation_dir(key.document);
    let live = self.layout.live_path(key);
    let backup = self.layout.backup_path(key);
    self.fs.create_dir_all(&dir).map_err(Error::write_failed(&dir))?;

    let had_live = self.fs.exists(&live);
    if had_live {
      self.fs.rename(&live, &backup).map_err(Error::write_failed(&live))?;
    }

    if let Err(source) = self.fs.write(&live, &bytes) {
      self.roll_back(key, &live, &backup, had_live);
      return Err(Error::WriteFailed { path: live, source });
    }

    let outcome = if had_live {
      let history = self.history_locked(key).unwrap_or_else(|e| {
        warn!(key = %key, error = %e, "cannot list history");
        Vec::new()
      });
      let history_path = |millis: i64| self.layout.history_path(key, millis);
      let outcome = self.retention.apply(Pass {
        fs: self.fs.as_ref(),
        live: &live,
        backup: &backup,
        history,
        history_path: &history_path,
      });
      if let Err(e) = self.fs.remove_file(&backup) {
        warn!(path = %backup.display(), error = %e, "cannot delete snapshot backup");
      }
      outcome
    } else {
      RetentionOutcome::default()
    };

    debug!(
      project = %key.document.project,
      document = %key.document.document,
      principal = %key.principal,
      bytes = bytes.len(),
      "snapshot written"
    );
    Ok(outcome)
  }

  fn roll_back(&self, key: &SnapshotKey, live: &Path, backup: &Path, had_live: bool) {
    if self.fs.exists(live)
      && let Err(e) = self.fs.remove_file(live)
    {
      warn!(path = %live.display(), error = %e, "cannot delete partial snapshot");
    }
    if had_live {
      match self.fs.rename(backup, live) {
        Ok(()) => info!(key = %key, "previous snapshot restored after failed write"),
        Err(e) => error!(
          key = %key,
          path = %backup.display(),
          error = %e,
          "cannot restore previous snapshot after failed write"
        ),
      }
    }
  }

  pub(crate) fn decode_file(&self, path: &Path) -> Result<Snapshot> {
    let bytes = self.fs.read(path).map_err(Error::io(path))?;
    decode_snapshot(&bytes).map_err(|source| Error::CorruptSnapshot {
      path: path.to_owned(),
      source,
    })
  }

  // ── History ───────────────────────────────────────────────────────────

  /// History entries of `key`, oldest first.
  pub fn history(&self, key: &SnapshotKey) -> Result<Vec<HistoryEntry>> {
    self.guard.with(key, || self.history_locked(key))
  }

  /// Decode one history entry, running the validator's `repair` on it.
  pub fn read_history(&self, key: &SnapshotKey, timestamp: i64) -> Result<Snapshot> {
    self.guard.with(key, || self.read_history_locked(key, timestamp))
  }

  /// Make a history entry the live snapshot again, through the normal write
  /// path (so the current snapshot is itself subject to retention).
  pub fn restore(&self, key: &SnapshotKey, timestamp: i64) -> Result<RetentionOutcome> {
    self.guard.with(key, || {
      let snapshot = self.read_history_locked(key, timestamp)?;
      let outcome = self.write_locked(key, &snapshot)?;
      info!(key = %key, timestamp, "snapshot restored from history");
      Ok(outcome)
    })
  }

  fn read_history_locked(&self, key: &SnapshotKey, timestamp: i64) -> Result<Snapshot> {
    let entry = self
      .history_locked(key)?
      .into_iter()
      .find(|e| e.timestamp == timestamp)
      .ok_or_else(|| Error::HistoryNotFound { key: key.clone(), timestamp })?;
    let mut snapshot = self.decode_file(&entry.path)?;
    self.validator.repair(&mut snapshot)?;
    Ok(snapshot)
  }

  fn history_locked(&self, key: &SnapshotKey) -> Result<Vec<HistoryEntry>> {
    let mut entries = Vec::new();
    for (principal, kind, path) in self.annotation_files(key.document)? {
      let FileKind::History(timestamp) = kind else { continue };
      if principal != key.principal {
        continue;
      }
      let modified = self.fs.modified(&path).map_err(Error::io(&path))?;
      entries.push(HistoryEntry { timestamp, modified, path });
    }
    entries.sort_by_key(|e| (e.modified, e.timestamp));
    Ok(entries)
  }

  /// Every store-owned file in the annotation folder of `doc`.
  pub(crate) fn annotation_files(
    &self,
    doc: DocumentRef,
  ) -> Result<Vec<(Principal, FileKind, PathBuf)>> {
    let dir = self.layout.annotation_dir(doc);
    let paths = match self.fs.read_dir(&dir) {
      Ok(paths) => paths,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io { path: dir, source: e }),
    };
    Ok(
      paths
        .into_iter()
        .filter_map(|path| {
          let name = path.file_name()?.to_str()?;
          let (principal, kind) = self.layout.parse_file_name(name)?;
          Some((principal, kind, path))
        })
        .collect(),
    )
  }
}

pub(crate) fn remove_if_present(fs: &dyn Filesystem, path: &Path) -> Result<bool> {
  match fs.remove_file(path) {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(Error::Io { path: path.to_owned(), source: e }),
  }
}
