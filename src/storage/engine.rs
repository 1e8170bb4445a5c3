//! Bounded Storage Engine with Expiry Support
//!
//! This module implements the core key-value container for TideKV. Every
//! value shape (strings, hashes, lists, sets) lives in the same map, wrapped
//! in an [`Entry`] that carries an optional absolute expiry timestamp.
//!
//! ## Design Decisions
//!
//! 1. **Bounded**: the store never holds more than `max_keys` entries. Inserting
//!    a new key at capacity evicts the least recently used one.
//! 2. **Lazy Expiry**: an entry whose expiry has passed is logically absent;
//!    any access that finds it removes it on the spot.
//! 3. **Active Expiry**: the sweeper samples keys through [`StorageEngine::sample_keys`]
//!    and reaps them with [`StorageEngine::remove_if_expired`].
//! 4. **One internal lock**: the map and the recency index are guarded by a
//!    single `parking_lot::Mutex`. Logical atomicity across several calls is
//!    the job of the per-key locks in [`crate::storage::locks`].
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     StorageEngine                        │
//! │  Mutex<Inner>                                            │
//! │  ┌──────────────────────────┐  ┌──────────────────────┐  │
//! │  │ map: key -> Slot         │  │ recency: stamp -> key│  │
//! │  │      Slot { entry, stamp}│  │ (BTreeMap, oldest    │  │
//! │  │                          │  │  stamp first)        │  │
//! │  └──────────────────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each hit or write gives the key a fresh, strictly increasing stamp, so the
//! first entry of `recency` is always the eviction victim.
//!
//! Keys are also kept in a dense `slots` vector (each `Slot` remembers its
//! position) so the sweeper can pick random keys without walking the map.

use super::value::Value;
use parking_lot::Mutex;
use rand::seq::index;
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Default capacity of the store.
pub const DEFAULT_MAX_KEYS: usize = 100_000;

/// Current wall-clock time in whole unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// Absolute expiry in unix seconds (None = never expires)
    pub expires_at: Option<i64>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates an entry that expires `ttl_secs` from now.
    ///
    /// Zero or a negative TTL yields an entry that is already expired.
    pub fn with_ttl(value: Value, ttl_secs: i64) -> Self {
        Self {
            value,
            expires_at: Some(unix_now().saturating_add(ttl_secs)),
        }
    }

    /// Checks whether this entry has expired at the given instant.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

/// Capacity settings for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of resident keys (at least 1)
    pub max_keys: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently resident (including not yet reaped expired ones)
    pub keys: usize,
    /// Reads that found a live key
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Entries removed because their TTL passed
    pub expired: u64,
    /// Entries removed to make room for new keys
    pub evicted: u64,
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    stamp: u64,
    /// Position of the key in `Inner::slots`.
    pos: usize,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<String, Slot>,
    recency: BTreeMap<u64, String>,
    slots: Vec<String>,
    clock: u64,
    stats: StorageStats,
}

impl Inner {
    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let slot = self.map.remove(key)?;
        self.recency.remove(&slot.stamp);
        self.unlink(slot.pos);
        Some(slot.entry)
    }

    /// Drops position `pos` from `slots`, moving the last key into the gap.
    fn unlink(&mut self, pos: usize) {
        self.slots.swap_remove(pos);
        if let Some(moved) = self.slots.get(pos) {
            if let Some(slot) = self.map.get_mut(moved) {
                slot.pos = pos;
            }
        }
    }

    /// Looks up a live entry, refreshing its recency.
    ///
    /// An expired entry is removed and reported as absent.
    fn live(&mut self, key: &str, now: i64) -> Option<&mut Slot> {
        let expired = self.map.get(key)?.entry.is_expired_at(now);
        if expired {
            self.remove(key);
            self.stats.expired += 1;
            return None;
        }

        let stamp = self.next_stamp();
        let slot = self.map.get_mut(key)?;
        let old = std::mem::replace(&mut slot.stamp, stamp);
        self.recency.remove(&old);
        self.recency.insert(stamp, key.to_owned());
        Some(slot)
    }

    /// Like [`Inner::live`] but counts the hit or miss.
    fn lookup(&mut self, key: &str, now: i64) -> Option<&mut Slot> {
        let found = self.live(key, now).is_some();
        if found {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        if found {
            self.map.get_mut(key)
        } else {
            None
        }
    }

    /// Inserts or overwrites, evicting the oldest key when a new key would
    /// exceed `max_keys`.
    fn insert(&mut self, key: String, entry: Entry, max_keys: usize) {
        let stamp = self.next_stamp();

        if let Some(slot) = self.map.get_mut(&key) {
            let old = std::mem::replace(&mut slot.stamp, stamp);
            slot.entry = entry;
            self.recency.remove(&old);
            self.recency.insert(stamp, key);
            return;
        }

        while self.map.len() >= max_keys {
            let Some((_, victim)) = self.recency.pop_first() else {
                break;
            };
            if let Some(slot) = self.map.remove(&victim) {
                self.unlink(slot.pos);
            }
            self.stats.evicted += 1;
            debug!(key = %victim, "evicted least recently used key");
        }

        let pos = self.slots.len();
        self.slots.push(key.clone());
        self.recency.insert(stamp, key.clone());
        self.map.insert(key, Slot { entry, stamp, pos });
    }
}

/// The bounded key-value store shared by every connection.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` and share it freely. Each method takes the internal
/// mutex for its own duration only; multi-step sequences that must not
/// interleave with other clients are protected by [`KeyLocks`](super::KeyLocks).
///
/// # Example
///
/// ```
/// use tidekv::storage::{StorageEngine, Value};
///
/// let engine = StorageEngine::new();
/// engine.set("name", Value::from("tide"));
/// assert_eq!(engine.get("name"), Some(Value::from("tide")));
///
/// // A TTL of zero expires the key immediately.
/// engine.set_with_ttl("session", Value::from("abc"), 0);
/// assert_eq!(engine.get("session"), None);
/// ```
pub struct StorageEngine {
    inner: Mutex<Inner>,
    max_keys: usize,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StorageEngine")
            .field("keys", &inner.map.len())
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a store with the default capacity.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given capacity settings.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_keys: config.max_keys.max(1),
        }
    }

    /// Maximum number of resident keys.
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Gets a copy of the value stored at `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(key, Value::clone)
    }

    /// Gets the value together with its absolute expiry.
    pub fn get_with_ttl(&self, key: &str) -> Option<(Value, Option<i64>)> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner
            .lookup(key, now)
            .map(|slot| (slot.entry.value.clone(), slot.entry.expires_at))
    }

    /// Returns the absolute expiry of a live key.
    ///
    /// The outer `Option` is `None` when the key is absent; the inner one is
    /// `None` when the key never expires.
    pub fn expires_at(&self, key: &str) -> Option<Option<i64>> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.lookup(key, now).map(|slot| slot.entry.expires_at)
    }

    /// Runs `f` against the live value at `key` without cloning it.
    pub fn read<R>(&self, key: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.lookup(key, now).map(|slot| f(&slot.entry.value))
    }

    /// Runs `f` with the live value at `key`, or with `None` if it is absent.
    pub fn inspect<R>(&self, key: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let now = unix_now();
        let mut inner = self.inner.lock();
        f(inner.lookup(key, now).map(|slot| &slot.entry.value))
    }

    /// Checks whether `key` holds a live entry.
    pub fn contains(&self, key: &str) -> bool {
        self.read(key, |_| ()).is_some()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stores `value`, clearing any previous TTL.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_entry(key.into(), Entry::new(value));
    }

    /// Stores `value` with a TTL of `ttl_secs` seconds from now.
    ///
    /// Zero or negative makes the key immediately expired.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl_secs: i64) {
        self.set_entry(key.into(), Entry::with_ttl(value, ttl_secs));
    }

    /// Stores a fully formed entry.
    pub fn set_entry(&self, key: String, entry: Entry) {
        self.inner.lock().insert(key, entry, self.max_keys);
    }

    /// Mutates the live value at `key` in place, preserving its TTL.
    ///
    /// Returns `None` without calling `f` if the key is absent.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.lookup(key, now).map(|slot| f(&mut slot.entry.value))
    }

    /// Replaces the absolute expiry of a live key.
    ///
    /// # Returns
    ///
    /// `false` if the key doesn't exist.
    pub fn set_expiry(&self, key: &str, expires_at: Option<i64>) -> bool {
        let now = unix_now();
        let mut inner = self.inner.lock();
        match inner.live(key, now) {
            Some(slot) => {
                slot.entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Removes `key`.
    ///
    /// # Returns
    ///
    /// `true` if a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = unix_now();
        let mut inner = self.inner.lock();
        match inner.remove(key) {
            Some(entry) if entry.is_expired_at(now) => {
                inner.stats.expired += 1;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Removes every key.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.recency.clear();
        inner.slots.clear();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Snapshot of all tracked keys, possibly including expired ones that
    /// have not been reaped yet.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().map.keys().cloned().collect()
    }

    /// Snapshot of keys that are live right now. Recency is not touched.
    pub fn live_keys(&self) -> Vec<String> {
        let now = unix_now();
        self.inner
            .lock()
            .map
            .iter()
            .filter(|(_, slot)| !slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes held by keys and values.
    pub fn used_memory(&self) -> usize {
        self.inner
            .lock()
            .map
            .iter()
            .map(|(key, slot)| key.len() + slot.entry.value.approximate_size())
            .sum()
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        let inner = self.inner.lock();
        StorageStats {
            keys: inner.map.len(),
            ..inner.stats
        }
    }

    // ========================================================================
    // Active expiry support
    // ========================================================================

    /// Picks up to `count` distinct random keys.
    ///
    /// Costs O(count) regardless of how many keys are stored.
    pub fn sample_keys(&self, count: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let len = inner.slots.len();
        index::sample(&mut rand::thread_rng(), len, count.min(len))
            .into_iter()
            .map(|pos| inner.slots[pos].clone())
            .collect()
    }

    /// Removes `key` if it is present and expired. Recency is not touched.
    ///
    /// # Returns
    ///
    /// `true` if the key was reaped.
    pub fn remove_if_expired(&self, key: &str) -> bool {
        let now = unix_now();
        let mut inner = self.inner.lock();
        let expired = inner
            .map
            .get(key)
            .is_some_and(|slot| slot.entry.is_expired_at(now));
        if expired {
            inner.remove(key);
            inner.stats.expired += 1;
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn small(max_keys: usize) -> StorageEngine {
        StorageEngine::with_config(StoreConfig { max_keys })
    }

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();
        engine.set("key", Value::from("value"));
        assert_eq!(engine.get("key"), Some(Value::from("value")));
        assert_eq!(engine.get("missing"), None);
    }

    #[test]
    fn test_set_clears_ttl() {
        let engine = StorageEngine::new();
        engine.set_with_ttl("key", Value::from("v"), 100);
        assert!(engine.expires_at("key").flatten().is_some());

        engine.set("key", Value::from("v2"));
        assert_eq!(engine.expires_at("key"), Some(None));
    }

    #[test]
    fn test_zero_ttl_is_immediately_absent() {
        let engine = StorageEngine::new();
        for i in 0..20 {
            let key = format!("k{}", i);
            engine.set_with_ttl(key.clone(), Value::from("v"), 0);
            assert_eq!(engine.get(&key), None);
        }
        assert!(engine.is_empty());
        assert_eq!(engine.stats().expired, 20);
    }

    #[test]
    fn test_get_with_ttl_reports_absolute_expiry() {
        let engine = StorageEngine::new();
        let before = unix_now();
        engine.set_with_ttl("key", Value::from("v"), 60);

        let (value, at) = engine.get_with_ttl("key").unwrap();
        assert_eq!(value, Value::from("v"));
        let at = at.unwrap();
        assert!(at >= before + 60 && at <= unix_now() + 60);
    }

    #[test]
    fn test_update_preserves_ttl() {
        let engine = StorageEngine::new();
        engine.set_with_ttl("key", Value::from("a"), 100);
        let at = engine.expires_at("key");

        let len = engine.update("key", |v| {
            if let Value::String(s) = v {
                s.push('b');
            }
        });
        assert!(len.is_some());
        assert_eq!(engine.get("key"), Some(Value::from("ab")));
        assert_eq!(engine.expires_at("key"), at);
        assert_eq!(engine.update("missing", |_| ()), None);
    }

    #[test]
    fn test_delete() {
        let engine = StorageEngine::new();
        engine.set("key", Value::from("v"));
        assert!(engine.delete("key"));
        assert!(!engine.delete("key"));

        engine.set_with_ttl("gone", Value::from("v"), -1);
        assert!(!engine.delete("gone"));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_set_expiry() {
        let engine = StorageEngine::new();
        assert!(!engine.set_expiry("missing", Some(1)));

        engine.set("key", Value::from("v"));
        assert!(engine.set_expiry("key", Some(unix_now() + 10)));
        assert!(engine.contains("key"));
        assert!(engine.set_expiry("key", Some(unix_now() - 1)));
        assert!(!engine.contains("key"));
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let engine = small(3);
        engine.set("a", Value::from("1"));
        engine.set("b", Value::from("2"));
        engine.set("c", Value::from("3"));

        // Touch "a" so "b" becomes the oldest.
        assert!(engine.get("a").is_some());
        engine.set("d", Value::from("4"));

        assert_eq!(engine.len(), 3);
        assert!(engine.contains("a"));
        assert!(!engine.contains("b"));
        assert!(engine.contains("c"));
        assert!(engine.contains("d"));
        assert_eq!(engine.stats().evicted, 1);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let engine = small(2);
        engine.set("a", Value::from("1"));
        engine.set("b", Value::from("2"));
        engine.set("a", Value::from("3"));

        assert_eq!(engine.len(), 2);
        assert!(engine.contains("b"));
        assert_eq!(engine.stats().evicted, 0);
    }

    #[test]
    fn test_bound_holds_under_many_inserts() {
        let engine = small(50);
        for i in 0..500 {
            engine.set(format!("key{}", i), Value::from("v"));
            assert!(engine.len() <= 50);
        }
        assert!(engine.contains("key499"));
        assert!(!engine.contains("key0"));
    }

    #[test]
    fn test_keys_snapshot_and_live_keys() {
        let engine = StorageEngine::new();
        engine.set("live", Value::from("v"));
        engine.set_with_ttl("dead", Value::from("v"), 0);

        let mut all = engine.keys();
        all.sort();
        assert_eq!(all, vec!["dead".to_string(), "live".to_string()]);
        assert_eq!(engine.live_keys(), vec!["live".to_string()]);
    }

    #[test]
    fn test_sample_and_reap() {
        let engine = StorageEngine::new();
        for i in 0..10 {
            engine.set_with_ttl(format!("dead{}", i), Value::from("v"), 0);
        }
        engine.set("live", Value::from("v"));

        let sample = engine.sample_keys(100);
        assert_eq!(sample.len(), 11);

        let reaped = sample.iter().filter(|k| engine.remove_if_expired(k)).count();
        assert_eq!(reaped, 10);
        assert_eq!(engine.len(), 1);
        assert!(!engine.remove_if_expired("live"));
    }

    #[test]
    fn test_sample_tracks_removals_and_evictions() {
        let engine = small(20);
        for i in 0..50 {
            engine.set(format!("key{}", i), Value::from("v"));
        }
        for i in (30..50).step_by(3) {
            engine.delete(&format!("key{}", i));
        }
        engine.set_with_ttl("key49", Value::from("v"), 0);
        assert!(engine.get("key49").is_none());

        let mut sample = engine.sample_keys(1_000);
        assert_eq!(sample.len(), engine.len());
        assert!(sample.iter().all(|key| engine.contains(key)));
        sample.sort();
        sample.dedup();
        assert_eq!(sample.len(), engine.len());

        let few = engine.sample_keys(3);
        assert_eq!(few.len(), 3);
        assert!(few.iter().all(|key| engine.contains(key)));

        engine.flush();
        assert!(engine.sample_keys(5).is_empty());
        engine.set("fresh", Value::from("v"));
        assert_eq!(engine.sample_keys(5), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_flush_and_stats() {
        let engine = StorageEngine::new();
        engine.set("a", Value::from("1"));
        engine.get("a");
        engine.get("b");

        let stats = engine.stats();
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        engine.flush();
        assert!(engine.is_empty());
        assert_eq!(engine.used_memory(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(key.clone(), Value::from("value"));
                    engine.get(&key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }
}
