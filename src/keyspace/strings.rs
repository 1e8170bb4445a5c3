//! String values.

use super::Keyspace;
use crate::error::{KvError, KvResult};
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::storage::{unix_now, Value};

/// Extracts a string or reports the key as not holding one.
fn expect_string(value: &Value) -> KvResult<&String> {
    value.as_string().ok_or(KvError::StringNotFound)
}

fn expect_string_mut(value: &mut Value) -> KvResult<&mut String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(KvError::StringNotFound),
    }
}

/// Maps a possibly negative index into `0..len` by wrapping around.
fn wrap_index(index: i64, len: i64) -> i64 {
    ((index % len) + len) % len
}

/// Longest common subsequence of two byte strings.
///
/// Builds the full DP table and walks it back from the bottom-right corner.
fn longest_common_subsequence(a: &[u8], b: &[u8]) -> Vec<u8> {
    let (m, n) = (a.len(), b.len());
    let mut table = vec![vec![0u32; n + 1]; m + 1];

    for i in 0..m {
        for j in 0..n {
            table[i + 1][j + 1] = if a[i] == b[j] {
                table[i][j] + 1
            } else {
                table[i][j + 1].max(table[i + 1][j])
            };
        }
    }

    let mut out = Vec::with_capacity(table[m][n] as usize);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            out.push(a[i - 1]);
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    out.reverse();
    out
}

impl Keyspace {
    /// Reads a string under a lock the caller already holds.
    fn load_string(&self, key: &str) -> KvResult<String> {
        self.engine
            .read(key, |value| expect_string(value).cloned())
            .unwrap_or(Err(KvError::StringNotFound))
    }

    /// Returns the string stored at `key`.
    pub fn get(&self, key: &str) -> KvResult<String> {
        let _guard = self.locks.read_one(key);
        self.load_string(key)
    }

    /// Stores `value`, discarding any previous value and TTL.
    pub fn set(&self, key: &str, value: String) {
        let _guard = self.locks.write_one(key);
        self.engine.set(key, Value::String(value));
    }

    /// Stores `value` with a TTL of `seconds`.
    pub fn set_ex(&self, key: &str, seconds: i64, value: String) {
        let _guard = self.locks.write_one(key);
        self.engine.set_with_ttl(key, Value::String(value), seconds);
    }

    /// Appends to the string at `key`, creating it if needed. Returns the new
    /// length in bytes.
    pub fn append(&self, key: &str, suffix: &str) -> KvResult<usize> {
        let _guard = self.locks.write_one(key);

        let appended = self.engine.update(key, |value| {
            let s = expect_string_mut(value)?;
            s.push_str(suffix);
            Ok(s.len())
        });

        match appended {
            Some(result) => result,
            None => {
                self.engine.set(key, Value::from(suffix));
                Ok(suffix.len())
            }
        }
    }

    /// Adds `delta` to the integer stored at `key`. A missing key counts as 0.
    pub fn incr_by(&self, key: &str, delta: i64) -> KvResult<i64> {
        let _guard = self.locks.write_one(key);

        let updated = self.engine.update(key, |value| {
            let s = expect_string_mut(value)?;
            let current: i64 = s.parse().map_err(|_| KvError::NotAnInteger)?;
            let next = current.checked_add(delta).ok_or(KvError::Overflow)?;
            *s = next.to_string();
            Ok(next)
        });

        match updated {
            Some(result) => result,
            None => {
                self.engine.set(key, Value::String(delta.to_string()));
                Ok(delta)
            }
        }
    }

    pub fn incr(&self, key: &str) -> KvResult<i64> {
        self.incr_by(key, 1)
    }

    pub fn decr_by(&self, key: &str, delta: i64) -> KvResult<i64> {
        let delta = delta.checked_neg().ok_or(KvError::Overflow)?;
        self.incr_by(key, delta)
    }

    pub fn decr(&self, key: &str) -> KvResult<i64> {
        self.incr_by(key, -1)
    }

    /// Adds a float to the number stored at `key`. A missing key counts as 0.
    pub fn incr_by_float(&self, key: &str, delta: f64) -> KvResult<f64> {
        let _guard = self.locks.write_one(key);

        let updated = self.engine.update(key, |value| {
            let s = expect_string_mut(value)?;
            let current: f64 = s.trim().parse().map_err(|_| KvError::NotAFloat)?;
            let next = current + delta;
            if !next.is_finite() {
                return Err(KvError::NotAFloat);
            }
            *s = next.to_string();
            Ok(next)
        });

        match updated {
            Some(result) => result,
            None if delta.is_finite() => {
                self.engine.set(key, Value::String(delta.to_string()));
                Ok(delta)
            }
            None => Err(KvError::NotAFloat),
        }
    }

    /// Returns the string at `key` and deletes it.
    pub fn get_del(&self, key: &str) -> KvResult<String> {
        let _guard = self.locks.write_one(key);

        let value = self.load_string(key)?;
        self.engine.delete(key);
        Ok(value)
    }

    /// Returns the string at `key` and gives it a TTL of `seconds`.
    pub fn get_ex(&self, key: &str, seconds: i64) -> KvResult<String> {
        let _guard = self.locks.write_one(key);

        let value = self.load_string(key)?;
        self.engine
            .set_expiry(key, Some(unix_now().saturating_add(seconds)));
        Ok(value)
    }

    /// Returns the bytes between `start` and `end` inclusive.
    ///
    /// Both indices wrap modulo the length, so `-1` is the last byte and an
    /// index past the end wraps around to the front.
    ///
    /// # Errors
    ///
    /// [`KvError::StartAfterEnd`] if `start` lands after `end` once wrapped.
    pub fn get_range(&self, key: &str, start: i64, end: i64) -> KvResult<String> {
        let _guard = self.locks.read_one(key);

        let value = self.load_string(key)?;
        if value.is_empty() {
            return Ok(String::new());
        }

        let len = value.len() as i64;
        let start = wrap_index(start, len) as usize;
        let end = wrap_index(end, len) as usize;
        if start > end {
            return Err(KvError::StartAfterEnd);
        }

        Ok(String::from_utf8_lossy(&value.as_bytes()[start..=end]).into_owned())
    }

    /// Stores `value` and returns the previous string.
    ///
    /// Nothing is written when the key is absent.
    pub fn get_set(&self, key: &str, value: String) -> KvResult<String> {
        let _guard = self.locks.write_one(key);

        let old = self.load_string(key)?;
        self.engine.set(key, Value::String(value));
        Ok(old)
    }

    /// Longest common subsequence of the strings at `key1` and `key2`.
    pub fn lcs(&self, key1: &str, key2: &str) -> KvResult<String> {
        let _guard = self.locks.read(&[key1, key2]);

        let a = self.load_string(key1)?;
        let b = self.load_string(key2)?;
        let common = longest_common_subsequence(a.as_bytes(), b.as_bytes());
        Ok(String::from_utf8_lossy(&common).into_owned())
    }

    /// Length of [`Keyspace::lcs`].
    pub fn lcs_len(&self, key1: &str, key2: &str) -> KvResult<usize> {
        let _guard = self.locks.read(&[key1, key2]);

        let a = self.load_string(key1)?;
        let b = self.load_string(key2)?;
        Ok(longest_common_subsequence(a.as_bytes(), b.as_bytes()).len())
    }

    /// Reads several strings at once. Absent or non-string keys yield `None`.
    pub fn mget<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Option<String>> {
        let _guard = self.locks.read(keys);

        keys.iter()
            .map(AsRef::as_ref)
            .map(|key: &str| self.load_string(key).ok())
            .collect()
    }

    /// Stores several strings at once, atomically with respect to other
    /// keyspace operations.
    pub fn mset(&self, pairs: Vec<(String, String)>) {
        let keys: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();
        let _guard = self.locks.write(&keys);

        for (key, value) in &pairs {
            self.engine.set(key.as_str(), Value::String(value.clone()));
        }
    }

    /// Overwrites part of the string at `key` starting at byte `offset`,
    /// padding with NUL bytes as needed. Returns the new length.
    ///
    /// # Errors
    ///
    /// [`KvError::InvalidOffset`] for a negative offset, and
    /// [`KvError::OutOfRange`] if the result would exceed the largest bulk
    /// string a client can send (512 MiB).
    pub fn set_range(&self, key: &str, offset: i64, value: &str) -> KvResult<usize> {
        let offset = usize::try_from(offset).map_err(|_| KvError::InvalidOffset)?;
        let end = offset
            .checked_add(value.len())
            .filter(|&end| end <= MAX_BULK_SIZE)
            .ok_or(KvError::OutOfRange)?;
        let _guard = self.locks.write_one(key);

        let splice = |current: &str| -> String {
            let mut bytes = current.as_bytes().to_vec();
            if bytes.len() < end {
                bytes.resize(end, 0);
            }
            bytes[offset..end].copy_from_slice(value.as_bytes());
            String::from_utf8_lossy(&bytes).into_owned()
        };

        let updated = self.engine.update(key, |stored| {
            let s = expect_string_mut(stored)?;
            *s = splice(s);
            Ok(s.len())
        });

        match updated {
            Some(result) => result,
            None => {
                let s = splice("");
                let len = s.len();
                self.engine.set(key, Value::String(s));
                Ok(len)
            }
        }
    }

    /// Length in bytes of the string at `key`.
    pub fn strlen(&self, key: &str) -> KvResult<usize> {
        let _guard = self.locks.read_one(key);

        self.engine
            .read(key, |value| expect_string(value).map(String::len))
            .unwrap_or(Err(KvError::StringNotFound))
    }
}
