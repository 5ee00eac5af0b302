//! In-memory tier: a bounded, TTL-aware map with least-recently-used
//! eviction.
//!
//! The backing store, the live-key index, and the counters all live behind
//! one mutex, so every operation observes them in a consistent state. The
//! store announces each capacity eviction through a notification hook, and
//! that hook is the only thing that maintains the index, which keeps the two
//! from drifting no matter how entries leave.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{expiry_millis, unix_millis, Clock, SystemClock};
use crate::stats::MemoryTierStats;

struct MemoryEntry<V> {
    value: V,
    expires_at_ms: u64,
    last_used: u64,
}

impl<V> MemoryEntry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Bounded key-value store with exact least-recently-used eviction.
///
/// Single-threaded on purpose; the tier wraps it in a mutex. Every entry
/// dropped under capacity pressure is reported through the `on_evict` hook
/// so the caller's bookkeeping can follow along.
struct BoundedLruStore<V> {
    entries: HashMap<String, MemoryEntry<V>>,
    max_entries: usize,
    use_counter: u64,
}

impl<V> BoundedLruStore<V> {
    /// A zero cap would make every insert evict itself; clamp to one.
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            use_counter: 0,
        }
    }

    fn next_stamp(&mut self) -> u64 {
        self.use_counter += 1;
        self.use_counter
    }

    /// Inserts `value`, evicting least-recently-used entries as needed to
    /// stay within capacity. Replacing an existing key never evicts.
    fn insert(
        &mut self,
        key: String,
        value: V,
        expires_at_ms: u64,
        mut on_evict: impl FnMut(&str),
    ) {
        let stamp = self.next_stamp();
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_entries {
                let Some(victim) = self.least_recently_used() else {
                    break;
                };
                self.entries.remove(&victim);
                on_evict(&victim);
            }
        }
        self.entries.insert(
            key,
            MemoryEntry {
                value,
                expires_at_ms,
                last_used: stamp,
            },
        );
    }

    /// Key with the oldest use stamp. Linear scan; the store is small by
    /// construction.
    fn least_recently_used(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
    }

    /// Fetches an entry and marks it as just used.
    fn get(&mut self, key: &str) -> Option<&MemoryEntry<V>> {
        let stamp = self.next_stamp();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = stamp;
        Some(&*entry)
    }

    /// Fetches an entry without touching its recency.
    fn peek(&self, key: &str) -> Option<&MemoryEntry<V>> {
        self.entries.get(key)
    }

    fn remove(&mut self, key: &str) -> Option<MemoryEntry<V>> {
        self.entries.remove(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Inner<V> {
    store: BoundedLruStore<V>,
    /// Keys believed present, maintained by the eviction hook and by the
    /// tier's own mutations. Never re-checked against TTLs.
    live_keys: HashSet<String>,
    stats: MemoryTierStats,
}

/// Bounded in-process cache tier with per-entry TTLs.
///
/// Lookups are lazy about expiry: a dead entry is purged the moment a lookup
/// trips over it and is reported as a miss. Nothing here ever fails; the
/// worst a caller can observe is absence.
pub struct MemoryTier<V> {
    inner: Mutex<Inner<V>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> MemoryTier<V> {
    /// Creates a tier holding at most `max_entries`, applying `default_ttl`
    /// when an insert names no TTL of its own.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self::with_clock(max_entries, default_ttl, Arc::new(SystemClock))
    }

    /// Like [`MemoryTier::new`] with an injected time source.
    pub fn with_clock(max_entries: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: BoundedLruStore::new(max_entries),
                live_keys: HashSet::new(),
                stats: MemoryTierStats::default(),
            }),
            default_ttl,
            clock,
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// The entry's deadline is fixed now, at insertion; later lookups refresh
    /// recency but never the deadline. At capacity the least-recently-used
    /// entry makes room first.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let expires_at_ms = expiry_millis(self.clock.now(), ttl.unwrap_or(self.default_ttl));

        let mut guard = self.inner.lock();
        let Inner {
            store,
            live_keys,
            stats,
        } = &mut *guard;

        store.insert(key.clone(), value, expires_at_ms, |victim| {
            live_keys.remove(victim);
            stats.evictions += 1;
        });
        live_keys.insert(key);
    }

    /// Returns the live value under `key`, bumping its recency.
    ///
    /// An entry past its deadline is purged here and counts as a miss.
    pub fn lookup(&self, key: &str) -> Option<V> {
        let now_ms = unix_millis(self.clock.now());
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // Outer None: absent. Inner None: present but past its deadline.
        let found = inner.store.get(key).map(|entry| {
            if entry.is_expired(now_ms) {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match found {
            Some(Some(value)) => {
                inner.stats.hits += 1;
                Some(value)
            }
            Some(None) => {
                inner.store.remove(key);
                inner.live_keys.remove(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Whether [`lookup`](MemoryTier::lookup) would return a value, without
    /// cloning it or refreshing its recency. Purges an expired entry just
    /// like a lookup would.
    pub fn contains_live(&self, key: &str) -> bool {
        let now_ms = unix_millis(self.clock.now());
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.store.peek(key).map(|entry| entry.is_expired(now_ms)) {
            Some(false) => true,
            Some(true) => {
                inner.store.remove(key);
                inner.live_keys.remove(key);
                inner.stats.expirations += 1;
                false
            }
            None => false,
        }
    }

    /// Drops `key` if present. Unknown keys are a no-op.
    pub fn remove(&self, key: &str) {
        let mut guard = self.inner.lock();
        guard.store.remove(key);
        guard.live_keys.remove(key);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.store.clear();
        guard.live_keys.clear();
    }

    /// Keys believed present.
    ///
    /// This is the eviction-hook view: keys leave it when they are removed,
    /// cleared, evicted, or purged by a lookup, but an entry that merely
    /// expired and has not been touched since is still listed.
    pub fn live_keys(&self) -> HashSet<String> {
        self.inner.lock().live_keys.clone()
    }

    /// Number of entries held, purged or not.
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot.
    pub fn stats(&self) -> MemoryTierStats {
        let guard = self.inner.lock();
        MemoryTierStats {
            entry_count: guard.store.len(),
            ..guard.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(60);

    fn tier_on_manual_clock(max_entries: usize) -> (MemoryTier<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let tier = MemoryTier::with_clock(max_entries, TTL, clock.clone());
        (tier, clock)
    }

    #[test]
    fn insert_then_lookup_returns_the_value() {
        let (tier, _clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), None);
        assert_eq!(tier.lookup("a"), Some("alpha".to_string()));
    }

    #[test]
    fn lookup_misses_on_absent_key() {
        let (tier, _clock) = tier_on_manual_clock(10);
        assert_eq!(tier.lookup("ghost"), None);
        assert_eq!(tier.stats().misses, 1);
    }

    #[test]
    fn overwrite_replaces_the_value() {
        let (tier, _clock) = tier_on_manual_clock(10);
        tier.insert("a", "one".to_string(), None);
        tier.insert("a", "two".to_string(), None);
        assert_eq!(tier.lookup("a"), Some("two".to_string()));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn entries_expire_at_their_deadline() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::from_secs(1)));

        clock.advance(Duration::from_millis(999));
        assert_eq!(tier.lookup("a"), Some("alpha".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(tier.lookup("a"), None);
    }

    #[test]
    fn default_ttl_applies_when_none_is_given() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), None);

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(tier.lookup("a"), Some("alpha".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(tier.lookup("a"), None);
    }

    #[test]
    fn lookup_does_not_extend_the_deadline() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::from_secs(2)));

        // Touch it repeatedly right up to the deadline.
        clock.advance(Duration::from_secs(1));
        assert!(tier.lookup("a").is_some());
        clock.advance(Duration::from_millis(999));
        assert!(tier.lookup("a").is_some());

        clock.advance(Duration::from_millis(1));
        assert_eq!(tier.lookup("a"), None);
    }

    #[test]
    fn zero_ttl_is_dead_on_arrival() {
        let (tier, _clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::ZERO));
        assert_eq!(tier.lookup("a"), None);
        assert_eq!(tier.stats().expirations, 1);
    }

    #[test]
    fn expired_entries_purge_on_lookup() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(2));

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.lookup("a"), None);
        assert_eq!(tier.len(), 0);
        assert!(!tier.live_keys().contains("a"));
    }

    #[test]
    fn live_keys_lists_expired_but_untouched_entries() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(2));

        // The index tracks evictions, not deadlines.
        assert!(tier.live_keys().contains("a"));
        assert!(!tier.contains_live("a"));
        assert!(!tier.live_keys().contains("a"));
    }

    #[test]
    fn capacity_evicts_the_least_recently_used() {
        let (tier, _clock) = tier_on_manual_clock(2);
        tier.insert("a", "1".to_string(), None);
        tier.insert("b", "2".to_string(), None);

        // Touch "a" so "b" becomes the victim.
        assert!(tier.lookup("a").is_some());
        tier.insert("c", "3".to_string(), None);

        assert_eq!(tier.lookup("b"), None);
        assert!(tier.lookup("a").is_some());
        assert!(tier.lookup("c").is_some());
        assert_eq!(tier.stats().evictions, 1);
    }

    #[test]
    fn overwriting_at_capacity_does_not_evict() {
        let (tier, _clock) = tier_on_manual_clock(2);
        tier.insert("a", "1".to_string(), None);
        tier.insert("b", "2".to_string(), None);
        tier.insert("a", "1b".to_string(), None);

        assert_eq!(tier.len(), 2);
        assert!(tier.lookup("b").is_some());
        assert_eq!(tier.stats().evictions, 0);
    }

    #[test]
    fn contains_live_does_not_refresh_recency() {
        let (tier, _clock) = tier_on_manual_clock(2);
        tier.insert("a", "1".to_string(), None);
        tier.insert("b", "2".to_string(), None);

        // A peek at "a" must not save it from eviction.
        assert!(tier.contains_live("a"));
        tier.insert("c", "3".to_string(), None);

        assert_eq!(tier.lookup("a"), None);
        assert!(tier.lookup("b").is_some());
    }

    #[test]
    fn eviction_keeps_the_live_key_index_in_step() {
        let (tier, _clock) = tier_on_manual_clock(3);
        for i in 0..10 {
            tier.insert(format!("k{i}"), i.to_string(), None);
        }

        let live = tier.live_keys();
        assert_eq!(live.len(), 3);
        assert_eq!(tier.len(), 3);
        assert_eq!(tier.stats().evictions, 7);
        for key in ["k7", "k8", "k9"] {
            assert!(live.contains(key), "expected {key} to survive");
        }
    }

    #[test]
    fn remove_and_clear_are_idempotent() {
        let (tier, _clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), None);

        tier.remove("a");
        tier.remove("a");
        assert_eq!(tier.lookup("a"), None);

        tier.insert("b", "beta".to_string(), None);
        tier.clear();
        tier.clear();
        assert!(tier.is_empty());
        assert!(tier.live_keys().is_empty());
    }

    #[test]
    fn zero_capacity_clamps_to_one_entry() {
        let (tier, _clock) = tier_on_manual_clock(0);
        tier.insert("a", "1".to_string(), None);
        tier.insert("b", "2".to_string(), None);

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.lookup("a"), None);
        assert!(tier.lookup("b").is_some());
    }

    #[test]
    fn stats_track_the_whole_story() {
        let (tier, clock) = tier_on_manual_clock(10);
        tier.insert("a", "alpha".to_string(), Some(Duration::from_secs(1)));

        assert!(tier.lookup("a").is_some()); // hit
        assert!(tier.lookup("x").is_none()); // miss
        clock.advance(Duration::from_secs(2));
        assert!(tier.lookup("a").is_none()); // expired: miss + expiration

        let stats = tier.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    proptest! {
        #[test]
        fn capacity_bound_always_holds(
            max_entries in 1usize..8,
            ops in proptest::collection::vec((0u8..16, 0u8..3), 0..64),
        ) {
            let tier: MemoryTier<u8> = MemoryTier::with_clock(
                max_entries,
                TTL,
                Arc::new(ManualClock::at_epoch()),
            );

            for (key, op) in ops {
                let key = format!("k{key}");
                match op {
                    0 => tier.insert(key, 0, None),
                    1 => {
                        tier.lookup(&key);
                    }
                    _ => tier.remove(&key),
                }
                prop_assert!(tier.len() <= max_entries);
                prop_assert!(tier.live_keys().len() <= max_entries);
            }
        }
    }
}
