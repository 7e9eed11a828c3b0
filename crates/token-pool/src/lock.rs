//! Per-key refresh serialization
//!
//! One async mutex per `(tenant, kind)` key, created on demand. Locks for
//! different keys never contend, so tenant isolation is structural rather
//! than a convention. The guard releases on drop, which covers every exit
//! path of the critical section including panics and early returns.
//!
//! The map entry holds an `Arc` to its mutex; holders and waiters hold the
//! other strong references. Entries whose strong count has fallen back to
//! one (nobody holding, nobody waiting) are pruned lazily on the next
//! acquire, so the map tracks the working set instead of every key ever
//! refreshed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock acquisition gave up after the configured timeout.
#[derive(Debug, thiserror::Error)]
#[error("refresh lock for {key} not acquired within {timeout:?}")]
pub struct AcquireTimeout {
    pub key: String,
    pub timeout: Duration,
}

/// Held refresh slot for one key. Dropping releases the slot; release is
/// idempotent and automatic.
#[derive(Debug)]
pub struct RefreshGuard {
    _permit: OwnedMutexGuard<()>,
}

/// Keyed mutual exclusion with bounded acquisition.
pub struct RefreshLock {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefreshLock {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Block until the lock for `key` is available or `timeout` elapses.
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Result<RefreshGuard, AcquireTimeout> {
        let entry = {
            let mut entries = self.entries.lock().await;
            // Prune idle entries: count 1 means only the map holds the mutex
            entries.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            entries.entry(key.to_owned()).or_default().clone()
        };

        match tokio::time::timeout(timeout, entry.lock_owned()).await {
            Ok(permit) => Ok(RefreshGuard { _permit: permit }),
            Err(_) => Err(AcquireTimeout {
                key: key.to_owned(),
                timeout,
            }),
        }
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for RefreshLock {
    fn default() -> Self {
        Self::new()
    }
}
