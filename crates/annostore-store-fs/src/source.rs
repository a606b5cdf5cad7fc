//! Stored source files, kept next to a document's annotation folder.

use std::io;

use annostore_core::DocumentRef;
use tracing::info;

use crate::{Error, Result, SnapshotStore};

fn check_name(name: &str) -> Result<()> {
  if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
    return Err(Error::InvalidSourceName(name.to_owned()));
  }
  Ok(())
}

impl SnapshotStore {
  /// Store the original file of a document under its own name.
  pub fn write_source(&self, doc: DocumentRef, name: &str, bytes: &[u8]) -> Result<()> {
    check_name(name)?;
    let dir = self.layout.source_dir(doc);
    self.fs.create_dir_all(&dir).map_err(Error::io(&dir))?;
    let path = dir.join(name);
    self.fs.write(&path, bytes).map_err(Error::io(&path))?;
    info!(document = %doc, path = %path.display(), "source file stored");
    Ok(())
  }

  pub fn read_source(&self, doc: DocumentRef, name: &str) -> Result<Vec<u8>> {
    check_name(name)?;
    let path = self.layout.source_dir(doc).join(name);
    self.fs.read(&path).map_err(|e| match e.kind() {
      io::ErrorKind::NotFound => Error::SourceNotFound { document: doc, name: name.to_owned() },
      _ => Error::Io { path: path.clone(), source: e },
    })
  }

  /// Delete everything stored for a document: source, snapshots, backups and
  /// history. Returns whether the document folder existed.
  pub fn remove_document(&self, doc: DocumentRef) -> Result<bool> {
    let dir = self.layout.document_dir(doc);
    match self.fs.remove_dir_all(&dir) {
      Ok(()) => {
        info!(document = %doc, "document folder removed");
        Ok(true)
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(Error::Io { path: dir, source: e }),
    }
  }
}
