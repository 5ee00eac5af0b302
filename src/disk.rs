//! Disk tier: one JSON record per key, grouped per cache instance.
//!
//! Records carry their own expiry deadline, so a cache directory stays
//! meaningful across process restarts. Lookups never mutate the directory;
//! reclaiming expired or unreadable records is the job of
//! [`DiskTier::sweep_expired`], which the owner must call, as the tier runs
//! no background work of its own.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{expiry_millis, unix_millis, Clock, SystemClock};
use crate::path::{entry_path, is_entry_file, is_temp_file, temp_path};
use crate::stats::DiskTierStats;
use crate::types::CacheError;

/// Wire format of one entry file. Writes instantiate this with `&V`, reads
/// with an owned `V`.
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord<V> {
    expires_at_ms: u64,
    value: V,
}

/// Expiry header alone; lets the sweep decide without decoding values.
#[derive(Debug, Deserialize)]
struct RecordHeader {
    expires_at_ms: u64,
}

/// Outcome of one expired-entry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Files examined: entry records plus stranded scratch files.
    pub scanned: usize,
    /// Files deleted, whether expired, undecodable, or stranded.
    pub removed: usize,
    /// Bytes those deletions reclaimed.
    pub bytes_freed: u64,
}

#[derive(Default)]
struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Persistent cache tier that stores each entry as one file.
///
/// Synchronization is a readers-writer barrier over the whole directory:
/// lookups and size queries share it, while inserts, removals, clears and
/// sweeps hold it exclusively. The barrier is in-process only; two processes
/// pointed at the same instance directory are not coordinated.
pub struct DiskTier<V> {
    directory: PathBuf,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    barrier: RwLock<()>,
    counters: TierCounters,
    _value: PhantomData<fn() -> V>,
}

impl<V> DiskTier<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Opens the tier rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`CacheError::AccessDenied`] when the directory cannot be created.
    pub fn new(directory: PathBuf, default_ttl: Duration) -> Result<Self, CacheError> {
        Self::with_clock(directory, default_ttl, Arc::new(SystemClock))
    }

    /// Like [`DiskTier::new`] with an injected time source.
    pub fn with_clock(
        directory: PathBuf,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        fs::create_dir_all(&directory).map_err(|source| CacheError::AccessDenied {
            path: directory.clone(),
            source,
        })?;
        debug!(dir = %directory.display(), "disk tier opened");
        Ok(Self {
            directory,
            default_ttl,
            clock,
            barrier: RwLock::new(()),
            counters: TierCounters::default(),
            _value: PhantomData,
        })
    }

    /// Serializes `value` and writes it as this key's entry file, replacing
    /// any previous record.
    ///
    /// The record lands under a temporary name first and is renamed into
    /// place, so a reader racing this write sees either the old record or
    /// the new one, never a torn file.
    pub fn insert(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let result = self.write_record(key, value, ttl.unwrap_or(self.default_ttl));
        let counter = if result.is_ok() {
            &self.counters.writes
        } else {
            &self.counters.write_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn write_record(&self, key: &str, value: &V, ttl: Duration) -> Result<(), CacheError> {
        // Encode outside the barrier; only the filesystem needs exclusivity.
        let record = DiskRecord {
            expires_at_ms: expiry_millis(self.clock.now(), ttl),
            value,
        };
        let bytes = serde_json::to_vec(&record)?;

        let path = entry_path(&self.directory, key);
        let temp = temp_path(&path);

        let _write = self.barrier.write();
        if let Err(e) = fs::write(&temp, &bytes) {
            // A failed write can still leave a partial scratch file.
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Reads this key's record if present and still live.
    ///
    /// Absent files and expired records both come back as `Ok(None)`. An
    /// expired file stays where it is until the next sweep, since lookups
    /// hold only the shared side of the barrier.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] when the file exists but cannot be read;
    /// [`CacheError::Serialization`] when it no longer decodes.
    pub fn lookup(&self, key: &str) -> Result<Option<V>, CacheError> {
        let path = entry_path(&self.directory, key);
        let now_ms = unix_millis(self.clock.now());

        let read = self.barrier.read();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                drop(read);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        drop(read);

        let record: DiskRecord<V> = serde_json::from_slice(&bytes)?;
        if now_ms >= record.expires_at_ms {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(record.value))
    }

    /// Deletes this key's entry file. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = entry_path(&self.directory, key);
        let _write = self.barrier.write();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every file in the tier's directory, stranded scratch files
    /// included.
    ///
    /// Keeps deleting past individual failures and reports the first one
    /// afterwards, so one stubborn file does not leave the rest behind.
    pub fn clear(&self) -> Result<(), CacheError> {
        let _write = self.barrier.write();
        let mut first_error = None;
        for dirent in fs::read_dir(&self.directory)? {
            let path = dirent?.path();
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Total size of the entry files on disk.
    pub fn byte_size(&self) -> Result<u64, CacheError> {
        let _read = self.barrier.read();
        let mut total = 0u64;
        for path in self.entry_files()? {
            match fs::metadata(&path) {
                Ok(meta) => total += meta.len(),
                // Files can vanish between the listing and the stat.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Scans the tier and deletes every record whose deadline has passed.
    ///
    /// Records that no longer decode are deleted too: they can never serve a
    /// hit again, so the space may as well come back. Scratch files stranded
    /// by an interrupted write go the same way. Holds the exclusive side of
    /// the barrier for the whole pass; the owner decides when that cost is
    /// paid.
    pub fn sweep_expired(&self) -> Result<SweepReport, CacheError> {
        let now_ms = unix_millis(self.clock.now());
        let _write = self.barrier.write();

        let mut report = SweepReport::default();
        for dirent in fs::read_dir(&self.directory)? {
            let path = dirent?.path();
            if !path.is_file() {
                continue;
            }
            let is_temp = is_temp_file(&path);
            if !is_temp && !is_entry_file(&path) {
                // Foreign files are none of our business.
                continue;
            }
            report.scanned += 1;
            let dead = if is_temp {
                // Its rename never happened; the record is unreachable.
                true
            } else {
                match Self::read_deadline(&path) {
                    Ok(Some(deadline)) => now_ms >= deadline,
                    Ok(None) => continue,
                    Err(CacheError::Serialization(_)) => true,
                    Err(e) => return Err(e),
                }
            };
            if !dead {
                continue;
            }
            let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes_freed += size;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            scanned = report.scanned,
            removed = report.removed,
            bytes_freed = report.bytes_freed,
            "disk tier sweep complete"
        );
        Ok(report)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DiskTierStats {
        DiskTierStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Directory backing this tier.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths of the entry files currently in the directory. Scratch files
    /// and foreign strays are not entries.
    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut files = Vec::new();
        for dirent in fs::read_dir(&self.directory)? {
            let path = dirent?.path();
            if path.is_file() && is_entry_file(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Expiry deadline of the record at `path`, decoding only the header.
    /// `Ok(None)` when the file vanished mid-scan.
    fn read_deadline(path: &Path) -> Result<Option<u64>, CacheError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let header: RecordHeader = serde_json::from_slice(&bytes)?;
        Ok(Some(header.expires_at_ms))
    }
}
