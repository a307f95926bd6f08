//! Per-resource keyed mutual exclusion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use crate::error::{MarketError, Result};

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyed async mutex serializing saga attempts that contend on one
/// resource.
///
/// All calls sharing a key run one at a time in arrival order (the tokio
/// mutex queues waiters fairly); distinct keys run fully concurrently.
/// Acquisition is bounded: a caller that cannot obtain the key within the
/// configured deadline fails with [`MarketError::LockTimeout`] instead of
/// queueing behind a stuck holder forever.
///
/// Critical sections must not re-acquire their own key; lock keys are
/// scoped per operation kind (`purchase-…`, `redeem-…`, `create-…`) so no
/// section ever does.
pub struct KeyedMutex {
    entries: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    acquire_timeout: Duration,
}

impl KeyedMutex {
    /// Creates a keyed mutex with the default 30s acquisition deadline.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Creates a keyed mutex with a custom acquisition deadline.
    pub fn with_timeout(acquire_timeout: Duration) -> Self {
        Self {
            entries: StdMutex::new(HashMap::new()),
            acquire_timeout,
        }
    }

    /// Runs the future after all previously queued calls for the same key
    /// have completed.
    pub async fn run<T, F>(&self, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let entry = {
            let mut entries = self.entries.lock().expect("keyed mutex poisoned");
            entries.entry(key.to_string()).or_default().clone()
        };

        let guard = tokio::time::timeout(self.acquire_timeout, entry.lock())
            .await
            .map_err(|_| {
                metrics::counter!("lock_acquire_timeouts_total").increment(1);
                MarketError::LockTimeout(key.to_string())
            })?;

        let result = fut.await;
        drop(guard);

        // Drop the map entry once nobody else holds it. The count is read
        // under the map lock, so a concurrent clone cannot race past it.
        {
            let mut entries = self.entries.lock().expect("keyed mutex poisoned");
            if Arc::strong_count(&entry) == 2 {
                entries.remove(key);
            }
        }

        result
    }

    /// Returns the number of keys currently tracked.
    pub fn active_keys(&self) -> usize {
        self.entries.lock().expect("keyed mutex poisoned").len()
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}
