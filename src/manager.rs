//! Two-tier coordinator: the one type most applications talk to.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::disk::{DiskTier, SweepReport};
use crate::log::Logger;
use crate::memory::MemoryTier;
use crate::stats::CacheStats;
use crate::types::{CacheConfig, CacheError};
use crate::{log_debug, log_info, log_warn};

/// Coordinates a memory tier and an optional disk tier behind one API.
///
/// Writes go through to every tier; reads stop at the first hit and promote
/// disk hits into memory. Disk trouble never reaches the caller: every
/// [`CacheError`] from the tier below is logged through the injected logger
/// and the operation degrades to its memory-only meaning. The manager adds
/// no locking of its own; each tier already guards its state.
pub struct CacheManager<V> {
    memory: MemoryTier<V>,
    disk: Option<DiskTier<V>>,
    logger: Arc<dyn Logger>,
}

impl<V> CacheManager<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Builds a manager from `config`.
    ///
    /// Construction cannot fail. When the disk tier is enabled but its
    /// directory cannot be resolved or created, the failure is logged and
    /// the cache runs memory-only from then on.
    pub fn new(config: CacheConfig, logger: Arc<dyn Logger>) -> Self {
        Self::with_clock(config, logger, Arc::new(SystemClock))
    }

    /// Like [`CacheManager::new`] with an injected time source shared by
    /// both tiers.
    pub fn with_clock(config: CacheConfig, logger: Arc<dyn Logger>, clock: Arc<dyn Clock>) -> Self {
        let memory = MemoryTier::with_clock(
            config.max_memory_entries,
            config.memory_ttl,
            Arc::clone(&clock),
        );
        let disk = if config.disk_tier_enabled {
            Self::open_disk_tier(&config, clock, &logger)
        } else {
            None
        };
        Self {
            memory,
            disk,
            logger,
        }
    }

    fn open_disk_tier(
        config: &CacheConfig,
        clock: Arc<dyn Clock>,
        logger: &Arc<dyn Logger>,
    ) -> Option<DiskTier<V>> {
        let Some(directory) = config.resolve_tier_directory() else {
            log_warn!(
                logger,
                "no cache directory on this platform; {} runs memory-only",
                config.instance_name
            );
            return None;
        };
        match DiskTier::with_clock(directory.clone(), config.disk_ttl, clock) {
            Ok(tier) => {
                log_info!(logger, "disk tier ready at {}", directory.display());
                Some(tier)
            }
            Err(e) => {
                log_warn!(
                    logger,
                    "disk tier unavailable ({e}); {} runs memory-only",
                    config.instance_name
                );
                None
            }
        }
    }

    /// Stores `value` under `key` in every tier.
    ///
    /// An explicit `ttl` overrides both tiers; `None` lets each tier apply
    /// its own default, which is how memory entries come to expire sooner
    /// than their disk twins. A disk failure is logged and swallowed, and
    /// the memory write happens regardless.
    pub fn put(&self, key: &str, value: V, ttl: Option<Duration>) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.insert(key, &value, ttl) {
                self.report(key, "write", &e);
            }
        }
        self.memory.insert(key, value, ttl);
    }

    /// Fetches `key`, consulting memory first, then disk.
    ///
    /// A disk hit is promoted into the memory tier under the memory tier's
    /// default TTL, so the next lookup is answered without touching disk.
    /// Disk failures are logged and read as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.memory.lookup(key) {
            return Some(value);
        }
        let disk = self.disk.as_ref()?;
        match disk.lookup(key) {
            Ok(Some(value)) => {
                self.memory.insert(key, value.clone(), None);
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                self.report(key, "read", &e);
                None
            }
        }
    }

    /// Drops `key` from every tier. Unknown keys are a no-op.
    pub fn remove(&self, key: &str) {
        self.memory.remove(key);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove(key) {
                self.report(key, "remove", &e);
            }
        }
    }

    /// Empties every tier.
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.clear() {
                log_warn!(self.logger, "disk clear failed: {e}");
            }
        }
    }

    /// On-disk footprint of the disk tier; 0 when it is absent or failing.
    pub fn total_disk_bytes(&self) -> u64 {
        let Some(disk) = &self.disk else { return 0 };
        match disk.byte_size() {
            Ok(bytes) => bytes,
            Err(e) => {
                log_warn!(self.logger, "disk size query failed: {e}");
                0
            }
        }
    }

    /// Runs one expired-entry sweep on the disk tier.
    ///
    /// The memory tier expires lazily during lookups and needs no sweeping.
    /// Returns `None` when there is no disk tier or the sweep failed.
    pub fn sweep_expired(&self) -> Option<SweepReport> {
        let disk = self.disk.as_ref()?;
        match disk.sweep_expired() {
            Ok(report) => {
                log_debug!(
                    self.logger,
                    "sweep removed {} of {} entries ({} bytes)",
                    report.removed,
                    report.scanned,
                    report.bytes_freed
                );
                Some(report)
            }
            Err(e) => {
                log_warn!(self.logger, "disk sweep failed: {e}");
                None
            }
        }
    }

    /// Whether a disk tier is attached.
    pub fn has_disk_tier(&self) -> bool {
        self.disk.is_some()
    }

    /// Combined counters from both tiers.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory: self.memory.stats(),
            disk: self.disk.as_ref().map(DiskTier::stats),
        }
    }

    fn report(&self, key: &str, action: &str, error: &CacheError) {
        log_warn!(self.logger, "disk {action} for {key:?} failed: {error}");
    }
}
