//! History retention: when to archive a superseded snapshot and which old
//! history entries to drop.
//!
//! Retention runs right after a live snapshot was replaced, while the previous
//! content still sits in the `.old` backup. Archiving copies that backup to a
//! history file named with its modification time in milliseconds. Failures
//! here are logged and reported but never fail the write that triggered them.

use std::{
  path::{Path, PathBuf},
  time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fs::Filesystem;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Retention settings as they appear in configuration files. All durations
/// are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
  /// Minimum age of the newest history entry before another one is made.
  /// Negative disables history entirely.
  pub interval:   i64,
  /// Maximum number of retained versions per key, counting the live
  /// snapshot. Zero means unbounded.
  pub keep_count: usize,
  /// Maximum age of a history entry. Zero or negative disables age pruning.
  pub keep_age:   i64,
}

impl Default for HistoryConfig {
  fn default() -> Self { Self { interval: -1, keep_count: 0, keep_age: 0 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
  interval:   Option<Duration>,
  keep_count: usize,
  keep_age:   Option<Duration>,
}

impl RetentionPolicy {
  pub fn disabled() -> Self { Self { interval: None, keep_count: 0, keep_age: None } }

  pub fn new(interval: Duration, keep_count: usize, keep_age: Option<Duration>) -> Self {
    Self { interval: Some(interval), keep_count, keep_age }
  }

  pub fn is_enabled(&self) -> bool { self.interval.is_some() }
}

impl Default for RetentionPolicy {
  fn default() -> Self { Self::disabled() }
}

impl From<HistoryConfig> for RetentionPolicy {
  fn from(config: HistoryConfig) -> Self {
    let seconds = |s: i64| Duration::from_secs(s.unsigned_abs());
    Self {
      interval:   (config.interval >= 0).then(|| seconds(config.interval)),
      keep_count: config.keep_count,
      keep_age:   (config.keep_age > 0).then(|| seconds(config.keep_age)),
    }
  }
}

// ─── History entries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
  /// Milliseconds since the epoch, as encoded in the file name.
  pub timestamp: i64,
  pub modified:  SystemTime,
  pub path:      PathBuf,
}

/// What a retention pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
  pub archived: Option<PathBuf>,
  pub pruned:   Vec<PathBuf>,
  /// Best-effort steps that failed.
  pub failures: Vec<String>,
}

pub(crate) fn millis_since_epoch(time: SystemTime) -> i64 {
  time
    .duration_since(UNIX_EPOCH)
    .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    .unwrap_or(0)
}

// ─── Policy application ──────────────────────────────────────────────────────

/// Inputs of one retention pass for a single key.
pub(crate) struct Pass<'a> {
  pub fs:           &'a dyn Filesystem,
  pub live:         &'a Path,
  pub backup:       &'a Path,
  /// Existing history for the key, oldest first.
  pub history:      Vec<HistoryEntry>,
  pub history_path: &'a dyn Fn(i64) -> PathBuf,
}

impl RetentionPolicy {
  pub(crate) fn apply(&self, pass: Pass<'_>) -> RetentionOutcome {
    let mut outcome = RetentionOutcome::default();
    let Some(interval) = self.interval else { return outcome };
    if self.keep_count == 1 || !pass.fs.exists(pass.backup) {
      return outcome;
    }

    let now = match pass.fs.modified(pass.live) {
      Ok(t) => t,
      Err(e) => {
        warn!(path = %pass.live.display(), error = %e, "cannot stat live snapshot");
        SystemTime::now()
      }
    };

    let due = match pass.history.last() {
      None => true,
      Some(newest) => newest.modified + interval <= now,
    };
    if !due {
      return outcome;
    }

    let backup_time = match pass.fs.modified(pass.backup) {
      Ok(t) => t,
      Err(e) => {
        warn!(path = %pass.backup.display(), error = %e, "cannot stat backup");
        outcome.failures.push(format!("stat {}: {e}", pass.backup.display()));
        return outcome;
      }
    };
    let mut millis = millis_since_epoch(backup_time);
    let mut dest = (pass.history_path)(millis);
    while pass.fs.exists(&dest) {
      millis += 1;
      dest = (pass.history_path)(millis);
    }

    if let Err(e) = pass.fs.copy(pass.backup, &dest) {
      warn!(path = %dest.display(), error = %e, "cannot create history entry");
      outcome.failures.push(format!("copy to {}: {e}", dest.display()));
      return outcome;
    }
    info!(path = %dest.display(), "history entry created");
    outcome.archived = Some(dest);

    // The new entry never counts against its own creation.
    let mut remaining = pass.history;
    if self.keep_count > 0 {
      let keep = self.keep_count.saturating_sub(2);
      let excess = remaining.len().saturating_sub(keep);
      let doomed: Vec<_> = remaining.drain(..excess).collect();
      for entry in doomed {
        prune(pass.fs, &entry.path, &mut outcome);
      }
    }
    if let Some(keep_age) = self.keep_age {
      remaining.retain(|entry| {
        if entry.modified + keep_age < now {
          prune(pass.fs, &entry.path, &mut outcome);
          false
        } else {
          true
        }
      });
    }

    outcome
  }
}

fn prune(fs: &dyn Filesystem, path: &Path, outcome: &mut RetentionOutcome) {
  match fs.remove_file(path) {
    Ok(()) => {
      info!(path = %path.display(), "history entry pruned");
      outcome.pruned.push(path.to_owned());
    }
    Err(e) => {
      warn!(path = %path.display(), error = %e, "cannot prune history entry");
      outcome.failures.push(format!("remove {}: {e}", path.display()));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn config_maps_to_policy() {
    assert!(!RetentionPolicy::from(HistoryConfig::default()).is_enabled());

    let policy = RetentionPolicy::from(HistoryConfig {
      interval:   0,
      keep_count: 2,
      keep_age:   3600,
    });
    assert_eq!(
      policy,
      RetentionPolicy::new(Duration::ZERO, 2, Some(Duration::from_secs(3600)))
    );

    let no_age = RetentionPolicy::from(HistoryConfig { interval: 60, keep_count: 0, keep_age: -5 });
    assert_eq!(no_age, RetentionPolicy::new(Duration::from_secs(60), 0, None));
  }

  #[test]
  fn millis_are_taken_from_the_epoch() {
    let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    assert_eq!(millis_since_epoch(t), 1_700_000_000_123);
  }
}
