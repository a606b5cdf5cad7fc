//! Mutual exclusion for store operations.

use std::sync::Arc;

use annostore_core::SnapshotKey;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How widely a store operation locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
  /// Every operation of the store is serialised behind one mutex.
  Global,
  /// Operations on the same key are serialised; different keys run
  /// concurrently.
  #[default]
  PerKey,
}

pub struct Guard {
  scope:  LockScope,
  global: Arc<Mutex<()>>,
  keys:   DashMap<SnapshotKey, Arc<Mutex<()>>>,
}

impl Guard {
  pub fn new(scope: LockScope) -> Self {
    Self { scope, global: Arc::default(), keys: DashMap::new() }
  }

  pub fn scope(&self) -> LockScope { self.scope }

  /// Run `f` while holding the lock covering `key`. Not reentrant.
  ///
  /// Per-key mutexes live only while some caller holds or waits for them.
  pub fn with<T>(&self, key: &SnapshotKey, f: impl FnOnce() -> T) -> T {
    match self.scope {
      LockScope::Global => {
        let _held = self.global.lock();
        f()
      }
      LockScope::PerKey => {
        let mutex = self.keys.entry(key.clone()).or_default().value().clone();
        let result = {
          let _held = mutex.lock();
          f()
        };
        drop(mutex);
        // Entries are only cloned under the shard lock, so a count of one
        // means nobody else can reach this mutex any more.
        self.keys.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        result
      }
    }
  }
}
