//! Async facade over [`CacheManager`] for tokio applications.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task;

use crate::disk::SweepReport;
use crate::manager::CacheManager;

/// Clonable async handle to a shared [`CacheManager`].
///
/// Every call moves the tier work onto tokio's blocking pool, so disk reads
/// and writes never stall the async runtime. The surface mirrors the
/// manager's never-fails contract: a broken disk tier shows up as absence,
/// not as an error.
#[derive(Clone)]
pub struct CacheClient<V> {
    manager: Arc<CacheManager<V>>,
}

impl<V> CacheClient<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(manager: Arc<CacheManager<V>>) -> Self {
        Self { manager }
    }

    /// Stores `value` under `key`.
    pub async fn save(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let manager = Arc::clone(&self.manager);
        let key = key.into();
        let _ = task::spawn_blocking(move || manager.put(&key, value, ttl)).await;
    }

    /// Fetches `key` from the nearest tier that has it.
    pub async fn load(&self, key: impl Into<String>) -> Option<V> {
        let manager = Arc::clone(&self.manager);
        let key = key.into();
        task::spawn_blocking(move || manager.get(&key))
            .await
            .ok()
            .flatten()
    }

    /// Drops `key` from every tier.
    pub async fn remove(&self, key: impl Into<String>) {
        let manager = Arc::clone(&self.manager);
        let key = key.into();
        let _ = task::spawn_blocking(move || manager.remove(&key)).await;
    }

    /// Empties the cache.
    pub async fn clear(&self) {
        let manager = Arc::clone(&self.manager);
        let _ = task::spawn_blocking(move || manager.clear()).await;
    }

    /// Runs one expired-entry sweep on the disk tier.
    pub async fn sweep_expired(&self) -> Option<SweepReport> {
        let manager = Arc::clone(&self.manager);
        task::spawn_blocking(move || manager.sweep_expired())
            .await
            .ok()
            .flatten()
    }

    /// The shared manager, for synchronous callers holding the same cache.
    pub fn manager(&self) -> &CacheManager<V> {
        &self.manager
    }
}
