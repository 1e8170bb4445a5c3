//! Per-Key Lock Manager
//!
//! Maps every key that has ever been touched to its own reader-writer lock.
//! A logical operation acquires the locks for all of its keys up front and
//! holds them until the returned guard is dropped.
//!
//! ## Ordering
//!
//! Multi-key acquisition always sorts the keys lexicographically (and drops
//! duplicates) before locking. Two operations over overlapping key sets
//! therefore take their shared locks in the same order and cannot deadlock:
//!
//! ```text
//!   COPY b a        COPY a b
//!   lock(a)         lock(a)   <- waits
//!   lock(b)
//!   ...
//!   unlock(a, b)    lock(b)
//! ```
//!
//! Locks are created lazily and never removed, so every caller always sees
//! the same lock instance for a given key.

use dashmap::DashMap;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::sync::Arc;

type KeyLock = Arc<RwLock<()>>;

/// Shared read access to a set of keys. Released on drop.
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct ReadGuard {
    guards: Vec<ArcRwLockReadGuard<RawRwLock, ()>>,
}

/// Exclusive access to a set of keys. Released on drop.
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct WriteGuard {
    guards: Vec<ArcRwLockWriteGuard<RawRwLock, ()>>,
}

impl ReadGuard {
    /// Number of distinct keys held.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Releases the locks in sorted order.
    pub fn unlock(self) {
        drop(self);
    }
}

impl WriteGuard {
    /// Number of distinct keys held.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Releases the locks in sorted order.
    pub fn unlock(self) {
        drop(self);
    }
}

/// The key → lock table.
#[derive(Default)]
pub struct KeyLocks {
    table: DashMap<String, KeyLock>,
}

impl std::fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks")
            .field("locks", &self.table.len())
            .finish()
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that have a lock allocated.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the lock for `key`, creating it on first use.
    fn lock_for(&self, key: &str) -> KeyLock {
        if let Some(lock) = self.table.get(key) {
            return Arc::clone(lock.value());
        }
        Arc::clone(&self.table.entry(key.to_owned()).or_default())
    }

    /// Acquires shared locks on every key, in sorted order.
    pub fn read<K: AsRef<str>>(&self, keys: &[K]) -> ReadGuard {
        let guards = sorted_unique(keys)
            .into_iter()
            .map(|key| self.lock_for(key).read_arc())
            .collect();
        ReadGuard { guards }
    }

    /// Acquires exclusive locks on every key, in sorted order.
    pub fn write<K: AsRef<str>>(&self, keys: &[K]) -> WriteGuard {
        let guards = sorted_unique(keys)
            .into_iter()
            .map(|key| self.lock_for(key).write_arc())
            .collect();
        WriteGuard { guards }
    }

    /// Shared lock on a single key.
    pub fn read_one(&self, key: &str) -> ReadGuard {
        self.read(&[key])
    }

    /// Exclusive lock on a single key.
    pub fn write_one(&self, key: &str) -> WriteGuard {
        self.write(&[key])
    }
}

/// Sorts keys lexicographically and drops duplicates, so that an operation
/// naming the same key twice does not deadlock against itself.
fn sorted_unique<K: AsRef<str>>(keys: &[K]) -> Vec<&str> {
    let mut sorted: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_sorted_unique() {
        assert_eq!(sorted_unique(&["b", "a", "c", "a"]), vec!["a", "b", "c"]);
        assert!(sorted_unique::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_duplicate_keys_do_not_self_deadlock() {
        let locks = KeyLocks::new();
        let guard = locks.write(&["k", "k"]);
        assert_eq!(guard.len(), 1);
        guard.unlock();
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_readers_share() {
        let locks = KeyLocks::new();
        let first = locks.read_one("k");
        let second = locks.read(&["k", "other"]);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_lock_instance_is_stable() {
        let locks = KeyLocks::new();
        let a = locks.lock_for("k");
        let b = locks.lock_for("k");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_writer_excludes_writer() {
        let locks = Arc::new(KeyLocks::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let _guard = locks.write_one("shared");
                    // Non-atomic read-modify-write, safe only under the lock.
                    let seen = counter.load(Ordering::Relaxed);
                    counter.store(seen + 1, Ordering::Relaxed);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 1600);
    }

    #[test]
    fn test_opposite_order_multi_key_locking_terminates() {
        let locks = Arc::new(KeyLocks::new());

        let forward = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let _guard = locks.write(&["a", "b"]);
                }
            })
        };
        let backward = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let _guard = locks.write(&["b", "a"]);
                    thread::sleep(Duration::from_nanos(1));
                }
            })
        };

        forward.join().unwrap();
        backward.join().unwrap();
    }
}
