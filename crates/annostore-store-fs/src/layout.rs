//! On-disk layout of the repository.
//!
//! ```text
//! <root>/project/<pid>/document/<did>/source/<name>
//! <root>/project/<pid>/document/<did>/annotation/<principal>.<ext>
//! <root>/project/<pid>/document/<did>/annotation/<principal>.<ext>.old
//! <root>/project/<pid>/document/<did>/annotation/<principal>.<ext>.<millis>.bak
//! ```

use std::path::{Path, PathBuf};

use annostore_core::{DocumentRef, Principal, SnapshotKey};

use crate::{DEFAULT_EXTENSION, Error, Result};

const BACKUP_SUFFIX: &str = ".old";
const HISTORY_SUFFIX: &str = ".bak";

/// What a file in an annotation folder is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
  Live,
  Backup,
  /// A history entry named with the given millisecond timestamp.
  History(i64),
}

#[derive(Debug, Clone)]
pub struct Layout {
  root:      PathBuf,
  extension: String,
}

impl Layout {
  /// A leading dot on `extension` is ignored. Extensions that would make
  /// live, backup and history names ambiguous are rejected.
  pub fn new(root: impl Into<PathBuf>, extension: &str) -> Result<Self> {
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    check_extension(extension)?;
    Ok(Self { root: root.into(), extension: extension.to_owned() })
  }

  pub(crate) fn with_default_extension(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into(), extension: DEFAULT_EXTENSION.to_owned() }
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn extension(&self) -> &str { &self.extension }

  pub fn projects_dir(&self) -> PathBuf { self.root.join("project") }

  pub fn document_dir(&self, doc: DocumentRef) -> PathBuf {
    self
      .projects_dir()
      .join(doc.project.to_string())
      .join("document")
      .join(doc.document.to_string())
  }

  pub fn annotation_dir(&self, doc: DocumentRef) -> PathBuf {
    self.document_dir(doc).join("annotation")
  }

  pub fn source_dir(&self, doc: DocumentRef) -> PathBuf {
    self.document_dir(doc).join("source")
  }

  pub fn live_path(&self, key: &SnapshotKey) -> PathBuf {
    self
      .annotation_dir(key.document)
      .join(format!("{}.{}", key.principal, self.extension))
  }

  pub fn backup_path(&self, key: &SnapshotKey) -> PathBuf {
    self
      .annotation_dir(key.document)
      .join(format!("{}.{}{BACKUP_SUFFIX}", key.principal, self.extension))
  }

  pub fn history_path(&self, key: &SnapshotKey, millis: i64) -> PathBuf {
    self.annotation_dir(key.document).join(format!(
      "{}.{}.{millis}{HISTORY_SUFFIX}",
      key.principal, self.extension
    ))
  }

  /// Classify a file name found in an annotation folder. Names that do not
  /// belong to the store yield `None`.
  pub fn parse_file_name(&self, name: &str) -> Option<(Principal, FileKind)> {
    let ext = format!(".{}", self.extension);

    let (stem, kind) = if let Some(rest) = name.strip_suffix(BACKUP_SUFFIX) {
      (rest.strip_suffix(&ext)?, FileKind::Backup)
    } else if let Some(rest) = name.strip_suffix(HISTORY_SUFFIX) {
      let (rest, millis) = rest.rsplit_once('.')?;
      if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
      }
      (rest.strip_suffix(&ext)?, FileKind::History(millis.parse().ok()?))
    } else {
      (name.strip_suffix(&ext)?, FileKind::Live)
    };

    Some((stem.parse().ok()?, kind))
  }
}

fn check_extension(extension: &str) -> Result<()> {
  let reserved = [BACKUP_SUFFIX, HISTORY_SUFFIX]
    .iter()
    .any(|suffix| suffix.trim_start_matches('.').eq_ignore_ascii_case(extension));
  if extension.is_empty() || reserved || extension.contains(['.', '/', '\\', '\0']) {
    return Err(Error::InvalidExtension(extension.to_owned()));
  }
  Ok(())
}
