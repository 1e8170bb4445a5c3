//! Cross-type key operations.
//!
//! None of these look at the shape of the stored value.

use super::Keyspace;
use crate::error::{KvError, KvResult};
use crate::storage::unix_now;
use regex::Regex;
use std::str::FromStr;

/// The optional flag of `EXPIRE` / `EXPIREAT`.
///
/// | flag | proceeds when |
/// |------|---------------|
/// | none | always |
/// | `NX` | the key has no expiry |
/// | `XX` | the key has an expiry |
/// | `GT` | the key has an expiry and the new one is later |
/// | `LT` | the key has an expiry and the new one is earlier |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpireCondition {
    #[default]
    Always,
    Nx,
    Xx,
    Gt,
    Lt,
}

impl ExpireCondition {
    /// Checks the condition against the current absolute expiry.
    pub fn permits(self, current: Option<i64>, new: i64) -> bool {
        match (self, current) {
            (ExpireCondition::Always, _) => true,
            (ExpireCondition::Nx, current) => current.is_none(),
            (ExpireCondition::Xx, current) => current.is_some(),
            (ExpireCondition::Gt, Some(current)) => new > current,
            (ExpireCondition::Lt, Some(current)) => new < current,
            (ExpireCondition::Gt | ExpireCondition::Lt, None) => false,
        }
    }
}

impl FromStr for ExpireCondition {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "" => Ok(ExpireCondition::Always),
            "NX" => Ok(ExpireCondition::Nx),
            "XX" => Ok(ExpireCondition::Xx),
            "GT" => Ok(ExpireCondition::Gt),
            "LT" => Ok(ExpireCondition::Lt),
            _ => Err(KvError::Syntax),
        }
    }
}

impl Keyspace {
    /// Copies the value at `source` to `destination`, overwriting it.
    ///
    /// The copy is independent of the source and carries no TTL.
    ///
    /// # Errors
    ///
    /// [`KvError::SourceKeyNotFound`] if `source` is absent or expired; the
    /// destination is left untouched.
    pub fn copy(&self, source: &str, destination: &str) -> KvResult<i64> {
        let _guard = self.locks.write(&[source, destination]);

        let value = self.engine.get(source).ok_or(KvError::SourceKeyNotFound)?;
        self.engine.set(destination, value);
        Ok(1)
    }

    /// Removes every listed key, returning how many were live.
    pub fn delete<K: AsRef<str>>(&self, keys: &[K]) -> i64 {
        let _guard = self.locks.write(keys);
        keys.iter()
            .map(AsRef::as_ref)
            .filter(|key: &&str| self.engine.delete(key))
            .count() as i64
    }

    /// Counts the listed keys that are live. Repeated keys count each time.
    pub fn exists<K: AsRef<str>>(&self, keys: &[K]) -> i64 {
        let _guard = self.locks.read(keys);
        keys.iter()
            .map(AsRef::as_ref)
            .filter(|key: &&str| self.engine.contains(key))
            .count() as i64
    }

    /// Sets a TTL of `seconds` from now, subject to `condition`.
    ///
    /// Zero or negative seconds make the key absent straight away.
    pub fn expire(&self, key: &str, seconds: i64, condition: ExpireCondition) -> KvResult<()> {
        self.expire_at(key, unix_now().saturating_add(seconds), condition)
    }

    /// Sets the absolute expiry of `key` to `at` (unix seconds), subject to
    /// `condition`.
    ///
    /// # Errors
    ///
    /// - [`KvError::SourceKeyNotFound`] if the key is absent
    /// - [`KvError::ExpiryType`] if `condition` does not hold
    pub fn expire_at(&self, key: &str, at: i64, condition: ExpireCondition) -> KvResult<()> {
        let _guard = self.locks.write_one(key);

        let current = self.engine.expires_at(key).ok_or(KvError::SourceKeyNotFound)?;
        if !condition.permits(current, at) {
            return Err(KvError::ExpiryType);
        }
        self.engine.set_expiry(key, Some(at));
        Ok(())
    }

    /// Absolute expiry of `key` in unix seconds, or `-1` if it never expires.
    pub fn expire_time(&self, key: &str) -> KvResult<i64> {
        let _guard = self.locks.read_one(key);

        match self.engine.expires_at(key) {
            None => Err(KvError::SourceKeyNotFound),
            Some(None) => Ok(-1),
            Some(Some(at)) => Ok(at),
        }
    }

    /// Remaining seconds to live: `-2` if absent, `-1` if no expiry.
    pub fn ttl(&self, key: &str) -> i64 {
        let _guard = self.locks.read_one(key);

        match self.engine.expires_at(key) {
            None => -2,
            Some(None) => -1,
            Some(Some(at)) => (at - unix_now()).max(0),
        }
    }

    /// Clears the TTL of `key`. Returns `false` if the key is absent or had
    /// no TTL.
    pub fn persist(&self, key: &str) -> bool {
        let _guard = self.locks.write_one(key);

        match self.engine.expires_at(key) {
            Some(Some(_)) => self.engine.set_expiry(key, None),
            _ => false,
        }
    }

    /// Live keys whose name matches the regular expression `pattern`.
    ///
    /// This is a regex search, not a glob: `apple:*` matches any key
    /// containing `apple`.
    pub fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let regex = Regex::new(pattern).map_err(|_| KvError::InvalidRegex)?;

        Ok(self
            .engine
            .live_keys()
            .into_iter()
            .filter(|key| regex.is_match(key))
            .collect())
    }

    /// Shape name of the value at `key`, or `none`.
    pub fn key_type(&self, key: &str) -> &'static str {
        let _guard = self.locks.read_one(key);
        self.engine.read(key, |value| value.type_name()).unwrap_or("none")
    }

    /// Number of tracked keys.
    pub fn dbsize(&self) -> usize {
        self.engine.len()
    }

    /// Removes every key.
    pub fn flush(&self) {
        self.engine.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ExpiryConfig, StoreConfig};
    use std::sync::Arc;
    use std::thread;

    fn keyspace() -> Keyspace {
        Keyspace::default()
    }

    #[test]
    fn test_parse_condition() {
        assert_eq!("".parse::<ExpireCondition>(), Ok(ExpireCondition::Always));
        assert_eq!("nx".parse::<ExpireCondition>(), Ok(ExpireCondition::Nx));
        assert_eq!("Gt".parse::<ExpireCondition>(), Ok(ExpireCondition::Gt));
        assert_eq!("XY".parse::<ExpireCondition>(), Err(KvError::Syntax));
    }

    #[test]
    fn test_condition_truth_table() {
        use ExpireCondition::*;
        let cur = 1_000;
        let smaller = 500;
        let larger = 2_000;

        // (condition, current expiry, new expiry, expected)
        let table = [
            (Nx, None, smaller, true),
            (Nx, Some(cur), smaller, false),
            (Nx, Some(cur), larger, false),
            (Xx, None, smaller, false),
            (Xx, Some(cur), smaller, true),
            (Xx, Some(cur), larger, true),
            (Gt, None, larger, false),
            (Gt, Some(cur), smaller, false),
            (Gt, Some(cur), larger, true),
            (Gt, Some(cur), cur, false),
            (Lt, None, smaller, false),
            (Lt, Some(cur), smaller, true),
            (Lt, Some(cur), larger, false),
            (Lt, Some(cur), cur, false),
            (Always, None, smaller, true),
            (Always, Some(cur), larger, true),
        ];

        for (condition, current, new, expected) in table {
            assert_eq!(
                condition.permits(current, new),
                expected,
                "{condition:?} current={current:?} new={new}"
            );
        }
    }

    #[test]
    fn test_expire_through_keyspace() {
        let ks = keyspace();
        ks.set("k", "v".into());

        assert_eq!(ks.expire("k", 100, ExpireCondition::Xx), Err(KvError::ExpiryType));
        assert_eq!(ks.expire("k", 100, ExpireCondition::Gt), Err(KvError::ExpiryType));
        assert_eq!(ks.expire("k", 100, ExpireCondition::Nx), Ok(()));
        assert_eq!(ks.expire("k", 200, ExpireCondition::Nx), Err(KvError::ExpiryType));
        assert_eq!(ks.expire("k", 50, ExpireCondition::Gt), Err(KvError::ExpiryType));
        assert_eq!(ks.expire("k", 500, ExpireCondition::Gt), Ok(()));
        assert_eq!(ks.expire("k", 1000, ExpireCondition::Lt), Err(KvError::ExpiryType));
        assert_eq!(ks.expire("k", 300, ExpireCondition::Lt), Ok(()));

        let ttl = ks.ttl("k");
        assert!(ttl > 290 && ttl <= 300, "ttl = {ttl}");
    }

    #[test]
    fn test_expire_missing_key() {
        let ks = keyspace();
        assert_eq!(
            ks.expire("missing", 10, ExpireCondition::Always),
            Err(KvError::SourceKeyNotFound)
        );
    }

    #[test]
    fn test_expire_zero_removes_key() {
        let ks = keyspace();
        ks.set("k", "v".into());
        ks.expire("k", 0, ExpireCondition::Always).unwrap();
        assert_eq!(ks.get("k"), Err(KvError::StringNotFound));
        assert_eq!(ks.exists(&["k"]), 0);
    }

    #[test]
    fn test_expire_at_and_expire_time() {
        let ks = keyspace();
        assert_eq!(ks.expire_time("missing"), Err(KvError::SourceKeyNotFound));

        ks.set("k", "v".into());
        assert_eq!(ks.expire_time("k"), Ok(-1));

        let at = unix_now() + 3600;
        ks.expire_at("k", at, ExpireCondition::Always).unwrap();
        assert_eq!(ks.expire_time("k"), Ok(at));
    }

    #[test]
    fn test_ttl_and_persist() {
        let ks = keyspace();
        assert_eq!(ks.ttl("missing"), -2);

        ks.set("k", "v".into());
        assert_eq!(ks.ttl("k"), -1);
        assert!(!ks.persist("k"));

        ks.expire("k", 60, ExpireCondition::Always).unwrap();
        assert!(ks.persist("k"));
        assert_eq!(ks.ttl("k"), -1);
    }

    #[test]
    fn test_copy() {
        let ks = keyspace();
        ks.rpush("src", vec!["a".into(), "b".into()]).unwrap();

        assert_eq!(ks.copy("src", "dst"), Ok(1));
        assert_eq!(ks.lrange("dst", 0, -1), Ok(vec!["a".to_string(), "b".to_string()]));

        // The copy is deep.
        ks.rpush("src", vec!["c".into()]).unwrap();
        assert_eq!(ks.llen("dst"), Ok(2));
    }

    #[test]
    fn test_copy_missing_source_creates_nothing() {
        let ks = keyspace();
        assert_eq!(ks.copy("missing", "dest"), Err(KvError::SourceKeyNotFound));
        assert_eq!(ks.exists(&["dest"]), 0);
    }

    #[test]
    fn test_copy_opposite_directions_never_deadlocks() {
        let ks = Arc::new(keyspace());
        ks.set("A", "a".into());
        ks.set("B", "b".into());

        let handles: Vec<_> = [("A", "B"), ("B", "A")]
            .into_iter()
            .map(|(from, to)| {
                let ks = Arc::clone(&ks);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        ks.copy(from, to).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ks.exists(&["A", "B"]), 2);
    }

    #[test]
    fn test_delete_and_exists() {
        let ks = keyspace();
        ks.set("a", "1".into());
        ks.set("b", "2".into());

        assert_eq!(ks.exists(&["a", "b", "c", "a"]), 3);
        assert_eq!(ks.delete(&["a", "c", "a"]), 1);
        assert_eq!(ks.exists(&["a", "b"]), 1);
    }

    #[test]
    fn test_keys_regex() {
        let ks = keyspace();
        ks.set("apple:1", "x".into());
        ks.set("apple:2", "x".into());
        ks.set("banana:1", "x".into());

        let mut keys = ks.keys("apple:*").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["apple:1".to_string(), "apple:2".to_string()]);

        assert_eq!(ks.keys("(unclosed"), Err(KvError::InvalidRegex));
        assert_eq!(ks.keys(".*").unwrap().len(), 3);
    }

    #[test]
    fn test_keys_skips_expired() {
        let ks = keyspace();
        ks.set("live", "x".into());
        ks.set_ex("dead", 0, "x".into());
        assert_eq!(ks.keys(".*").unwrap(), vec!["live".to_string()]);
    }

    #[test]
    fn test_key_type_and_flush() {
        let ks = Keyspace::new(StoreConfig { max_keys: 10 }, ExpiryConfig::default());
        ks.set("s", "x".into());
        ks.sadd("set", vec!["m".into()]).unwrap();

        assert_eq!(ks.key_type("s"), "string");
        assert_eq!(ks.key_type("set"), "set");
        assert_eq!(ks.key_type("none"), "none");

        assert_eq!(ks.dbsize(), 2);
        ks.flush();
        assert_eq!(ks.dbsize(), 0);
    }
}
