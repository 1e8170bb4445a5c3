//! Hash values: string fields mapped to string values.

use super::{ExpireCondition, Keyspace};
use crate::error::{KvError, KvResult};
use crate::storage::Value;
use std::collections::HashMap;

fn expect_hash(value: &Value) -> KvResult<&HashMap<String, String>> {
    value.as_hash().ok_or(KvError::HashNotFound)
}

fn expect_hash_mut(value: &mut Value) -> KvResult<&mut HashMap<String, String>> {
    match value {
        Value::Hash(h) => Ok(h),
        _ => Err(KvError::HashNotFound),
    }
}

impl Keyspace {
    /// Runs `f` on the hash at `key` under a lock the caller holds.
    fn with_hash<R>(
        &self,
        key: &str,
        f: impl FnOnce(&HashMap<String, String>) -> KvResult<R>,
    ) -> KvResult<R> {
        self.engine
            .read(key, |value| expect_hash(value).and_then(f))
            .unwrap_or(Err(KvError::HashNotFound))
    }

    /// Sets fields on the hash at `key`, creating it if needed.
    ///
    /// # Returns
    ///
    /// The number of fields that did not exist before.
    pub fn hset(&self, key: &str, pairs: Vec<(String, String)>) -> KvResult<i64> {
        let _guard = self.locks.write_one(key);

        let mut pairs = Some(pairs);
        let updated = self.engine.update(key, |value| {
            let hash = expect_hash_mut(value)?;
            let added = pairs
                .take()
                .into_iter()
                .flatten()
                .filter(|(field, val)| hash.insert(field.clone(), val.clone()).is_none())
                .count();
            Ok(added as i64)
        });

        match updated {
            Some(result) => result,
            None => {
                let hash: HashMap<String, String> = pairs.into_iter().flatten().collect();
                let added = hash.len() as i64;
                self.engine.set(key, Value::Hash(hash));
                Ok(added)
            }
        }
    }

    /// Returns one field of the hash at `key`.
    ///
    /// # Errors
    ///
    /// [`KvError::HashNotFound`] if either the hash or the field is missing.
    pub fn hget(&self, key: &str, field: &str) -> KvResult<String> {
        let _guard = self.locks.read_one(key);
        self.with_hash(key, |hash| hash.get(field).cloned().ok_or(KvError::HashNotFound))
    }

    /// Checks whether `field` is set on the hash at `key`.
    pub fn hexists(&self, key: &str, field: &str) -> KvResult<bool> {
        let _guard = self.locks.read_one(key);
        self.with_hash(key, |hash| Ok(hash.contains_key(field)))
    }

    /// Removes `field` from the hash at `key`. Removing the last field
    /// removes the key.
    ///
    /// # Errors
    ///
    /// - [`KvError::HashNotFound`] if the hash is missing
    /// - [`KvError::KeyNotFound`] if the field is missing
    pub fn hdel(&self, key: &str, field: &str) -> KvResult<()> {
        let _guard = self.locks.write_one(key);

        let now_empty = self
            .engine
            .update(key, |value| {
                let hash = expect_hash_mut(value)?;
                hash.remove(field).ok_or(KvError::KeyNotFound)?;
                Ok(hash.is_empty())
            })
            .unwrap_or(Err(KvError::HashNotFound))?;

        if now_empty {
            self.engine.delete(key);
        }
        Ok(())
    }

    /// All fields and values of the hash at `key`, ordered by field.
    pub fn hgetall(&self, key: &str) -> KvResult<Vec<(String, String)>> {
        let _guard = self.locks.read_one(key);

        let mut pairs = self.with_hash(key, |hash| {
            Ok(hash
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect::<Vec<_>>())
        })?;
        pairs.sort_unstable();
        Ok(pairs)
    }

    /// Number of fields in the hash at `key`.
    pub fn hlen(&self, key: &str) -> KvResult<usize> {
        let _guard = self.locks.read_one(key);
        self.with_hash(key, |hash| Ok(hash.len()))
    }

    /// Sets a TTL on the whole hash; same rules as [`Keyspace::expire`].
    pub fn hexpire(&self, key: &str, seconds: i64, condition: ExpireCondition) -> KvResult<()> {
        self.expire(key, seconds, condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let ks = Keyspace::default();
        assert_eq!(ks.hset("h", pairs(&[("a", "1"), ("b", "2")])), Ok(2));
        assert_eq!(ks.hset("h", pairs(&[("a", "9"), ("c", "3")])), Ok(1));
        assert_eq!(ks.hget("h", "a"), Ok("9".to_string()));
        assert_eq!(ks.hlen("h"), Ok(3));
    }

    #[test]
    fn test_hget_missing() {
        let ks = Keyspace::default();
        assert_eq!(ks.hget("h", "a"), Err(KvError::HashNotFound));
        ks.hset("h", pairs(&[("a", "1")])).unwrap();
        assert_eq!(ks.hget("h", "zz"), Err(KvError::HashNotFound));
    }

    #[test]
    fn test_hash_on_string_key() {
        let ks = Keyspace::default();
        ks.set("s", "v".into());
        assert_eq!(ks.hget("s", "a"), Err(KvError::HashNotFound));
        assert_eq!(ks.hset("s", pairs(&[("a", "1")])), Err(KvError::HashNotFound));
        assert_eq!(ks.get("s"), Ok("v".to_string()));
    }

    #[test]
    fn test_hexists() {
        let ks = Keyspace::default();
        assert_eq!(ks.hexists("h", "a"), Err(KvError::HashNotFound));
        ks.hset("h", pairs(&[("a", "1")])).unwrap();
        assert_eq!(ks.hexists("h", "a"), Ok(true));
        assert_eq!(ks.hexists("h", "b"), Ok(false));
    }

    #[test]
    fn test_hdel() {
        let ks = Keyspace::default();
        assert_eq!(ks.hdel("h", "a"), Err(KvError::HashNotFound));

        ks.hset("h", pairs(&[("a", "1"), ("b", "2")])).unwrap();
        assert_eq!(ks.hdel("h", "zz"), Err(KvError::KeyNotFound));
        assert_eq!(ks.hdel("h", "a"), Ok(()));
        assert_eq!(ks.hdel("h", "b"), Ok(()));
        assert_eq!(ks.exists(&["h"]), 0);
    }

    #[test]
    fn test_hgetall_sorted() {
        let ks = Keyspace::default();
        ks.hset("h", pairs(&[("b", "2"), ("a", "1")])).unwrap();
        assert_eq!(ks.hgetall("h"), Ok(pairs(&[("a", "1"), ("b", "2")])));
        assert_eq!(ks.hgetall("nope"), Err(KvError::HashNotFound));
    }

    #[test]
    fn test_hexpire() {
        let ks = Keyspace::default();
        assert_eq!(
            ks.hexpire("h", 10, ExpireCondition::Always),
            Err(KvError::SourceKeyNotFound)
        );

        ks.hset("h", pairs(&[("a", "1")])).unwrap();
        ks.hexpire("h", 0, ExpireCondition::Always).unwrap();
        assert_eq!(ks.hget("h", "a"), Err(KvError::HashNotFound));
    }
}
