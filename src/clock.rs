//! Time sources for expiry decisions.
//!
//! Every tier measures entry lifetimes against wall-clock time rather than a
//! monotonic instant, because disk records carry their deadline across
//! process restarts. The [`Clock`] trait keeps the source of "now"
//! injectable: production code runs on [`SystemClock`], tests pin and advance
//! a [`ManualClock`] instead of sleeping through TTL boundaries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Production clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a clock pinned to `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock pinned to the Unix epoch, a convenient zero for tests.
    pub fn at_epoch() -> Self {
        Self::new(UNIX_EPOCH)
    }

    /// Moves the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock();
        *now += step;
    }

    /// Pins the clock to an absolute time.
    pub fn set(&self, to: SystemTime) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// Milliseconds since the Unix epoch. Pre-epoch times clamp to zero.
pub fn unix_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or(0)
}

/// Reconstructs a [`SystemTime`] from [`unix_millis`] output.
pub fn from_unix_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Whole milliseconds in `d`, clamped to `u64::MAX`.
pub fn duration_millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

/// Absolute expiry deadline, in epoch milliseconds, for an entry inserted at
/// `now` with time-to-live `ttl`. Saturates instead of wrapping when a
/// pathological TTL would overflow.
pub fn expiry_millis(now: SystemTime, ttl: Duration) -> u64 {
    unix_millis(now).saturating_add(duration_millis(ttl))
}
