//! Per-identity async locks
//!
//! Each identity gets its own `tokio::sync::Mutex`, created on first use and
//! dropped from the table once nobody holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Slot>>,
}

/// Holds one identity's lock until dropped
pub struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // The map never holds a half-applied update, so poisoning is ignored
    fn table(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let slot = Arc::clone(self.table().entry(key.to_string()).or_default());
        let guard = slot.lock_owned().await;
        KeyGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of identities with a live lock entry
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.table().len()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release first so the slot's count reflects only the table and waiters
        drop(self.guard.take());
        let mut table = self.owner.table();
        if table
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            table.remove(&self.key);
        }
    }
}
