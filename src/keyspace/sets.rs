//! Set values: unordered collections of unique strings.
//!
//! Reads on a missing key behave like reads on an empty set. Member lists are
//! returned sorted so replies are deterministic.

use super::Keyspace;
use crate::error::{KvError, KvResult};
use crate::storage::Value;
use std::collections::HashSet;

fn expect_set(value: &Value) -> KvResult<&HashSet<String>> {
    value.as_set().ok_or(KvError::SetNotFound)
}

fn expect_set_mut(value: &mut Value) -> KvResult<&mut HashSet<String>> {
    match value {
        Value::Set(s) => Ok(s),
        _ => Err(KvError::SetNotFound),
    }
}

fn sorted(members: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut members: Vec<String> = members.into_iter().collect();
    members.sort_unstable();
    members
}

impl Keyspace {
    /// Runs `f` on the set at `key`, or on an empty set if the key is absent.
    fn with_set<R>(&self, key: &str, f: impl FnOnce(&HashSet<String>) -> R) -> KvResult<R> {
        self.engine.inspect(key, |value| match value {
            Some(value) => expect_set(value).map(f),
            None => Ok(f(&HashSet::new())),
        })
    }

    /// Adds members to the set at `key`, creating it if needed.
    ///
    /// # Returns
    ///
    /// The number of members that were not already present.
    pub fn sadd(&self, key: &str, members: Vec<String>) -> KvResult<i64> {
        let _guard = self.locks.write_one(key);

        let mut members = Some(members);
        let added = self.engine.update(key, |value| {
            let set = expect_set_mut(value)?;
            let added = members
                .take()
                .into_iter()
                .flatten()
                .filter(|member| set.insert(member.clone()))
                .count();
            Ok(added as i64)
        });

        match added {
            Some(result) => result,
            None => {
                let set: HashSet<String> = members.into_iter().flatten().collect();
                let added = set.len() as i64;
                self.engine.set(key, Value::Set(set));
                Ok(added)
            }
        }
    }

    /// Removes members, returning how many were present. Removing the last
    /// member removes the key.
    pub fn srem(&self, key: &str, members: &[String]) -> KvResult<i64> {
        let _guard = self.locks.write_one(key);

        let outcome = self.engine.update(key, |value| {
            let set = expect_set_mut(value)?;
            let removed = members.iter().filter(|member| set.remove(*member)).count();
            Ok((removed as i64, set.is_empty()))
        });

        match outcome {
            Some(Ok((removed, now_empty))) => {
                if now_empty {
                    self.engine.delete(key);
                }
                Ok(removed)
            }
            Some(Err(err)) => Err(err),
            None => Ok(0),
        }
    }

    /// Number of members, 0 if the key is absent.
    pub fn scard(&self, key: &str) -> KvResult<usize> {
        let _guard = self.locks.read_one(key);
        self.with_set(key, HashSet::len)
    }

    /// Checks whether `member` belongs to the set at `key`.
    pub fn sismember(&self, key: &str, member: &str) -> KvResult<bool> {
        let _guard = self.locks.read_one(key);
        self.with_set(key, |set| set.contains(member))
    }

    /// All members of the set at `key`.
    pub fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        let _guard = self.locks.read_one(key);
        self.with_set(key, |set| sorted(set.iter().cloned()))
    }

    /// Members of the first set that are in none of the others. Missing keys
    /// count as empty sets.
    pub fn sdiff<K: AsRef<str>>(&self, keys: &[K]) -> KvResult<Vec<String>> {
        let _guard = self.locks.read(keys);

        let mut keys = keys.iter().map(AsRef::<str>::as_ref);
        let Some(first) = keys.next() else {
            return Ok(Vec::new());
        };

        let mut diff = self.with_set(first, HashSet::clone)?;
        for key in keys {
            self.with_set(key, |other| diff.retain(|member| !other.contains(member)))?;
        }
        Ok(sorted(diff))
    }
}
