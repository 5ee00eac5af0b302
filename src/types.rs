//! Shared error and configuration types.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default entry cap for the memory tier.
pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 50;

/// Default time-to-live applied by the memory tier: 12 hours.
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default time-to-live applied by the disk tier: 7 days.
pub const DEFAULT_DISK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Failures surfaced by the disk tier.
///
/// Absence is never an error: a missing or expired entry reads back as
/// `Ok(None)`. These variants cover genuine storage trouble, and the manager
/// downgrades every one of them to a logged miss so callers above it never
/// see a cache failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The tier's backing directory could not be created or entered.
    #[error("cache directory {} is not accessible: {source}", .path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A filesystem operation on an entry file failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// An entry record could not be encoded or decoded.
    #[error("cache record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Construction-time settings for a [`CacheManager`](crate::CacheManager).
///
/// The defaults describe a small metadata cache: up to 50 entries in memory
/// for 12 hours, persisted to disk for 7 days, stored under the platform
/// cache directory.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stratacache::CacheConfig;
///
/// let config = CacheConfig::new("thumbnails")
///     .with_max_memory_entries(200)
///     .with_disk_ttl(Duration::from_secs(24 * 60 * 60));
/// assert_eq!(config.instance_name, "thumbnails");
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace for this cache; becomes the on-disk directory name.
    pub instance_name: String,
    /// TTL applied by the memory tier when a put names none.
    pub memory_ttl: Duration,
    /// TTL applied by the disk tier when a put names none.
    pub disk_ttl: Duration,
    /// Entry cap for the memory tier.
    pub max_memory_entries: usize,
    /// Whether to open a disk tier at all.
    pub disk_tier_enabled: bool,
    /// Override for the platform cache directory.
    pub cache_root: Option<PathBuf>,
}

impl CacheConfig {
    /// Creates a configuration with the stock defaults under `instance_name`.
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            memory_ttl: DEFAULT_MEMORY_TTL,
            disk_ttl: DEFAULT_DISK_TTL,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
            disk_tier_enabled: true,
            cache_root: None,
        }
    }

    /// Sets the memory-tier default TTL.
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    /// Sets the disk-tier default TTL.
    pub fn with_disk_ttl(mut self, ttl: Duration) -> Self {
        self.disk_ttl = ttl;
        self
    }

    /// Sets the memory-tier entry cap.
    pub fn with_max_memory_entries(mut self, max: usize) -> Self {
        self.max_memory_entries = max;
        self
    }

    /// Disables the disk tier; the cache then lives in memory only.
    pub fn without_disk_tier(mut self) -> Self {
        self.disk_tier_enabled = false;
        self
    }

    /// Roots the disk tier under `root` instead of the platform cache
    /// directory. Tests point this at a temporary directory.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Directory that will hold this instance's entry files, or `None` when
    /// no override is set and the platform reports no cache directory.
    pub fn resolve_tier_directory(&self) -> Option<PathBuf> {
        let root = self.cache_root.clone().or_else(dirs::cache_dir)?;
        Some(crate::path::tier_directory(&root, &self.instance_name))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
