//! Runtime counters exposed by the tiers and aggregated by the manager.

/// Counters kept by the memory tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryTierStats {
    /// Lookups answered with a live value.
    pub hits: u64,
    /// Lookups that found nothing usable, including expired entries.
    pub misses: u64,
    /// Entries purged because a lookup found them past their deadline.
    pub expirations: u64,
    /// Entries dropped to respect the capacity bound.
    pub evictions: u64,
    /// Entries currently held, live or not yet purged.
    pub entry_count: usize,
}

/// Counters kept by the disk tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiskTierStats {
    /// Lookups answered with a live value.
    pub hits: u64,
    /// Lookups that found nothing usable, including expired records.
    pub misses: u64,
    /// Records written successfully.
    pub writes: u64,
    /// Write attempts that failed.
    pub write_failures: u64,
}

/// Combined snapshot across tiers, as reported by
/// [`CacheManager::stats`](crate::CacheManager::stats).
///
/// The rate helpers assume the manager's flow, where every `get` consults
/// memory first and only misses fall through to disk.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub memory: MemoryTierStats,
    /// `None` when the manager runs memory-only.
    pub disk: Option<DiskTierStats>,
}

impl CacheStats {
    /// Fraction of memory lookups that hit, in `0.0..=1.0`.
    pub fn memory_hit_rate(&self) -> f64 {
        rate(self.memory.hits, self.memory.misses)
    }

    /// Fraction of disk lookups that hit, in `0.0..=1.0`.
    pub fn disk_hit_rate(&self) -> f64 {
        self.disk.map_or(0.0, |disk| rate(disk.hits, disk.misses))
    }

    /// Fraction of `get` calls answered by either tier.
    pub fn overall_hit_rate(&self) -> f64 {
        let requests = self.memory.hits + self.memory.misses;
        if requests == 0 {
            return 0.0;
        }
        let disk_hits = self.disk.map_or(0, |disk| disk.hits);
        (self.memory.hits + disk_hits) as f64 / requests as f64
    }

    /// One-line rendering for logs.
    pub fn summary(&self) -> String {
        let memory = format!(
            "memory {}/{} hits ({:.1}%), {} entries",
            self.memory.hits,
            self.memory.hits + self.memory.misses,
            self.memory_hit_rate() * 100.0,
            self.memory.entry_count,
        );
        match self.disk {
            Some(disk) => format!(
                "{memory}; disk {}/{} hits ({:.1}%)",
                disk.hits,
                disk.hits + disk.misses,
                self.disk_hit_rate() * 100.0,
            ),
            None => format!("{memory}; no disk tier"),
        }
    }
}

fn rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
