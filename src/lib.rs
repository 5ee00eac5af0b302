//! Two-tier key-value cache: a bounded in-memory LRU in front of a
//! per-file disk store, with TTL expiry on both.
//!
//! The [`CacheManager`] is the front door. Writes go through to both tiers,
//! reads stop at the first hit and promote disk hits into memory, and every
//! disk failure is swallowed, logged through an injected [`Logger`], and
//! treated as a miss. A cache must make things faster or get out of the way;
//! it never gets to break the caller.
//!
//! Entry lifetimes are fixed at insertion. The memory tier expires lazily as
//! lookups trip over dead entries; the disk tier keeps expired records until
//! [`CacheManager::sweep_expired`] reclaims them. Both tiers read the time
//! from an injectable [`Clock`], which is what keeps expiry behavior
//! testable without sleeping.
//!
//! ```
//! use std::sync::Arc;
//! use stratacache::{CacheConfig, CacheManager, NoOpLogger};
//!
//! let config = CacheConfig::new("demo").without_disk_tier();
//! let cache: CacheManager<String> = CacheManager::new(config, Arc::new(NoOpLogger));
//!
//! cache.put("greeting", "hello".to_string(), None);
//! assert_eq!(cache.get("greeting"), Some("hello".to_string()));
//! ```
//!
//! Async applications wrap the manager in a [`CacheClient`], which runs
//! every operation on tokio's blocking pool.

pub mod client;
pub mod clock;
pub mod disk;
pub mod log;
pub mod manager;
pub mod memory;
pub mod path;
pub mod stats;
pub mod types;

pub use client::CacheClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use disk::{DiskTier, SweepReport};
pub use log::{LogLevel, Logger, NoOpLogger, TracingLogger};
pub use manager::CacheManager;
pub use memory::MemoryTier;
pub use stats::{CacheStats, DiskTierStats, MemoryTierStats};
pub use types::{CacheConfig, CacheError};

/// Crate version, straight from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn version_is_populated() {
        assert!(!super::VERSION.is_empty());
    }
}
