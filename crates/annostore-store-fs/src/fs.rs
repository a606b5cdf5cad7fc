//! The filesystem operations the snapshot store is built from.
//!
//! Every mutation the store performs goes through [`Filesystem`], so tests can
//! inject a failure at any single step of the replace sequence.

use std::{
  fs, io,
  io::Write as _,
  path::{Path, PathBuf},
  time::SystemTime,
};

pub trait Filesystem: Send + Sync {
  fn exists(&self, path: &Path) -> bool;

  fn create_dir_all(&self, path: &Path) -> io::Result<()>;

  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  /// Create or truncate `path`, write all of `bytes` and sync to disk.
  fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

  /// Rename, replacing `to` if it exists.
  fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

  fn remove_file(&self, path: &Path) -> io::Result<()>;

  fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

  /// Copy `from` to `to`, carrying over the modification time.
  fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

  fn modified(&self, path: &Path) -> io::Result<SystemTime>;

  fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

  /// Paths of the entries of a directory, in no particular order.
  fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
  fn exists(&self, path: &Path) -> bool { path.exists() }

  fn create_dir_all(&self, path: &Path) -> io::Result<()> { fs::create_dir_all(path) }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> { fs::read(path) }

  fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> { fs::rename(from, to) }

  fn remove_file(&self, path: &Path) -> io::Result<()> { fs::remove_file(path) }

  fn remove_dir_all(&self, path: &Path) -> io::Result<()> { fs::remove_dir_all(path) }

  fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
    let modified = fs::metadata(from)?.modified()?;
    fs::copy(from, to)?;
    self.set_modified(to, modified)
  }

  fn modified(&self, path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
  }

  fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
    fs::File::options().write(true).open(path)?.set_modified(time)
  }

  fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
    fs::read_dir(path)?
      .map(|entry| entry.map(|e| e.path()))
      .collect()
  }
}
