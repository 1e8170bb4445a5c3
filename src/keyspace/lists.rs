//! List values, backed by [`Deque`].
//!
//! Ranges use Redis conventions: indices are inclusive and negative values
//! count from the tail (`-1` is the last element). A list that becomes empty
//! is removed from the store.

use super::Keyspace;
use crate::error::{KvError, KvResult};
use crate::storage::{Deque, Value};
use std::str::FromStr;

/// One end of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Left,
    Right,
}

impl FromStr for ListEnd {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEFT" => Ok(ListEnd::Left),
            "RIGHT" => Ok(ListEnd::Right),
            _ => Err(KvError::Syntax),
        }
    }
}

/// Where `LINSERT` places the new element relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl FromStr for InsertPosition {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BEFORE" => Ok(InsertPosition::Before),
            "AFTER" => Ok(InsertPosition::After),
            _ => Err(KvError::Syntax),
        }
    }
}

type List = Deque<String>;

fn expect_list(value: &Value) -> KvResult<&List> {
    value.as_list().ok_or(KvError::ListNotFound)
}

fn expect_list_mut(value: &mut Value) -> KvResult<&mut List> {
    match value {
        Value::List(l) => Ok(l),
        _ => Err(KvError::ListNotFound),
    }
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Normalises an inclusive Redis range to `start..=end` in bounds, or `None`
/// if it selects nothing.
fn resolve_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let end = if end < 0 { end + len } else { end.min(len - 1) };
    (len > 0 && start <= end).then_some((start as usize, end as usize))
}

/// Checks a pop count against the list length.
fn pop_count(count: i64, len: usize) -> KvResult<usize> {
    match usize::try_from(count) {
        Ok(n) if n > 0 && n <= len => Ok(n),
        _ => Err(KvError::InvalidCount),
    }
}

impl Keyspace {
    /// Runs `f` on the list at `key` under a lock the caller holds.
    fn with_list<R>(&self, key: &str, f: impl FnOnce(&List) -> KvResult<R>) -> KvResult<R> {
        self.engine
            .read(key, |value| expect_list(value).and_then(f))
            .unwrap_or(Err(KvError::ListNotFound))
    }

    /// Mutates the list at `key` under a lock the caller holds, removing the
    /// key if `f` leaves it empty.
    fn modify_list<R>(&self, key: &str, f: impl FnOnce(&mut List) -> KvResult<R>) -> KvResult<R> {
        let (result, now_empty) = self
            .engine
            .update(key, |value| {
                let list = expect_list_mut(value)?;
                let result = f(list)?;
                Ok((result, list.is_empty()))
            })
            .unwrap_or(Err(KvError::ListNotFound))?;

        if now_empty {
            self.engine.delete(key);
        }
        Ok(result)
    }

    /// Pushes onto the list at `key`, creating it if needed. Returns the new
    /// length.
    fn push(&self, key: &str, end: ListEnd, values: Vec<String>) -> KvResult<usize> {
        let mut values = Some(values);
        let push_all = |list: &mut List, values: Vec<String>| {
            for value in values {
                match end {
                    ListEnd::Left => list.push_front(value),
                    ListEnd::Right => list.push_back(value),
                }
            }
            list.len()
        };

        let pushed = self.engine.update(key, |value| {
            let list = expect_list_mut(value)?;
            Ok(push_all(list, values.take().unwrap_or_default()))
        });

        match pushed {
            Some(result) => result,
            None => {
                let mut list = List::new();
                let len = push_all(&mut list, values.take().unwrap_or_default());
                self.engine.set(key, Value::List(list));
                Ok(len)
            }
        }
    }

    /// Prepends `values` one by one, so the last one ends up first.
    pub fn lpush(&self, key: &str, values: Vec<String>) -> KvResult<usize> {
        let _guard = self.locks.write_one(key);
        self.push(key, ListEnd::Left, values)
    }

    /// Appends `values` in order.
    pub fn rpush(&self, key: &str, values: Vec<String>) -> KvResult<usize> {
        let _guard = self.locks.write_one(key);
        self.push(key, ListEnd::Right, values)
    }

    /// Removes and returns the first `count` elements, in list order.
    ///
    /// # Errors
    ///
    /// - [`KvError::ListNotFound`] if the list is missing
    /// - [`KvError::InvalidCount`] unless `1 <= count <= len`
    pub fn lpop(&self, key: &str, count: i64) -> KvResult<Vec<String>> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            let n = pop_count(count, list.len())?;
            Ok((0..n).filter_map(|_| list.pop_front()).collect())
        })
    }

    /// Removes and returns the last `count` elements, in list order.
    ///
    /// `[a, b, c]` popped with a count of 2 returns `[b, c]`.
    pub fn rpop(&self, key: &str, count: i64) -> KvResult<Vec<String>> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            let n = pop_count(count, list.len())?;
            let mut popped: Vec<String> = (0..n).filter_map(|_| list.pop_back()).collect();
            popped.reverse();
            Ok(popped)
        })
    }

    /// Length of the list at `key`.
    pub fn llen(&self, key: &str) -> KvResult<usize> {
        let _guard = self.locks.read_one(key);
        self.with_list(key, |list| Ok(list.len()))
    }

    /// Element at `index`; negative indices count from the tail.
    pub fn lindex(&self, key: &str, index: i64) -> KvResult<String> {
        let _guard = self.locks.read_one(key);

        self.with_list(key, |list| {
            resolve_index(index, list.len())
                .and_then(|i| list.get(i).cloned())
                .ok_or(KvError::IndexOutOfRange)
        })
    }

    /// Replaces the element at `index`.
    pub fn lset(&self, key: &str, index: i64, value: String) -> KvResult<()> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            let i = resolve_index(index, list.len()).ok_or(KvError::IndexOutOfRange)?;
            list.set(i, value);
            Ok(())
        })
    }

    /// Elements between `start` and `end` inclusive.
    pub fn lrange(&self, key: &str, start: i64, end: i64) -> KvResult<Vec<String>> {
        let _guard = self.locks.read_one(key);

        self.with_list(key, |list| {
            Ok(match resolve_range(start, end, list.len()) {
                Some((start, end)) => list.slice_range(start, end),
                None => Vec::new(),
            })
        })
    }

    /// Keeps only the elements between `start` and `end` inclusive.
    pub fn ltrim(&self, key: &str, start: i64, end: i64) -> KvResult<()> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            match resolve_range(start, end, list.len()) {
                Some((start, end)) => {
                    for _ in end + 1..list.len() {
                        list.pop_back();
                    }
                    for _ in 0..start {
                        list.pop_front();
                    }
                }
                None => list.clear(),
            }
            Ok(())
        })
    }

    /// Inserts `value` next to the first occurrence of `pivot`.
    ///
    /// # Returns
    ///
    /// The new length, or `-1` if `pivot` is not in the list.
    pub fn linsert(
        &self,
        key: &str,
        position: InsertPosition,
        pivot: &str,
        value: String,
    ) -> KvResult<i64> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            let Some(found) = list.iter().position(|item| item == pivot) else {
                return Ok(-1);
            };
            let index = match position {
                InsertPosition::Before => found,
                InsertPosition::After => found + 1,
            };
            list.insert(index, value);
            Ok(list.len() as i64)
        })
    }

    /// Removes occurrences of `value`: the first `count` from the head when
    /// positive, the last `|count|` from the tail when negative, all of them
    /// when zero. Returns how many were removed.
    pub fn lrem(&self, key: &str, count: i64, value: &str) -> KvResult<usize> {
        let _guard = self.locks.write_one(key);

        self.modify_list(key, |list| {
            let limit = match count.unsigned_abs() {
                0 => usize::MAX,
                n => usize::try_from(n).unwrap_or(usize::MAX),
            };

            let mut matches: Vec<usize> = list
                .iter()
                .enumerate()
                .filter(|(_, item)| item.as_str() == value)
                .map(|(i, _)| i)
                .collect();
            if count < 0 {
                matches.reverse();
            }
            matches.truncate(limit);
            // Remove back to front so earlier indices stay valid.
            matches.sort_unstable_by(|a, b| b.cmp(a));

            for &i in &matches {
                list.remove(i);
            }
            Ok(matches.len())
        })
    }

    /// Pops from one end of `source` and pushes onto one end of
    /// `destination`, atomically. `source` and `destination` may be the same
    /// list.
    ///
    /// # Errors
    ///
    /// [`KvError::ListNotFound`] if `source` is missing, or if either key
    /// holds something other than a list.
    pub fn lmove(
        &self,
        source: &str,
        destination: &str,
        from: ListEnd,
        to: ListEnd,
    ) -> KvResult<String> {
        let _guard = self.locks.write(&[source, destination]);

        if self.engine.read(destination, |value| value.as_list().is_none()) == Some(true) {
            return Err(KvError::ListNotFound);
        }

        let value = self.modify_list(source, |list| {
            let popped = match from {
                ListEnd::Left => list.pop_front(),
                ListEnd::Right => list.pop_back(),
            };
            popped.ok_or(KvError::ListNotFound)
        })?;

        self.push(destination, to, vec![value.clone()])?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn keyspace_with(key: &str, items: &[&str]) -> Keyspace {
        let ks = Keyspace::default();
        ks.rpush(key, strings(items)).unwrap();
        ks
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0, -1, 4), Some((0, 3)));
        assert_eq!(resolve_range(-2, -1, 4), Some((2, 3)));
        assert_eq!(resolve_range(-100, 100, 4), Some((0, 3)));
        assert_eq!(resolve_range(3, 1, 4), None);
        assert_eq!(resolve_range(5, 10, 4), None);
        assert_eq!(resolve_range(0, -1, 0), None);
    }

    #[test]
    fn test_push_both_ends() {
        let ks = Keyspace::default();
        assert_eq!(ks.rpush("l", strings(&["b", "c"])), Ok(2));
        assert_eq!(ks.lpush("l", strings(&["a", "z"])), Ok(4));
        assert_eq!(ks.lrange("l", 0, -1), Ok(strings(&["z", "a", "b", "c"])));
    }

    #[test]
    fn test_push_onto_string_key() {
        let ks = Keyspace::default();
        ks.set("s", "v".into());
        assert_eq!(ks.rpush("s", strings(&["a"])), Err(KvError::ListNotFound));
    }

    #[test]
    fn test_rpop_returns_tail_in_order() {
        let ks = keyspace_with("list", &["val1", "val2", "val3"]);
        assert_eq!(ks.rpop("list", 2), Ok(strings(&["val2", "val3"])));
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["val1"])));
    }

    #[test]
    fn test_lpop() {
        let ks = keyspace_with("list", &["a", "b", "c"]);
        assert_eq!(ks.lpop("list", 2), Ok(strings(&["a", "b"])));
        assert_eq!(ks.lpop("list", 1), Ok(strings(&["c"])));
        assert_eq!(ks.exists(&["list"]), 0);
    }

    #[test]
    fn test_pop_count_validation() {
        let ks = keyspace_with("list", &["a", "b"]);
        assert_eq!(ks.rpop("list", 0), Err(KvError::InvalidCount));
        assert_eq!(ks.rpop("list", -1), Err(KvError::InvalidCount));
        assert_eq!(ks.lpop("list", 3), Err(KvError::InvalidCount));
        assert_eq!(ks.rpop("missing", 1), Err(KvError::ListNotFound));
        assert_eq!(ks.llen("list"), Ok(2));
    }

    #[test]
    fn test_llen_and_lindex() {
        let ks = keyspace_with("list", &["a", "b", "c"]);
        assert_eq!(ks.llen("list"), Ok(3));
        assert_eq!(ks.llen("missing"), Err(KvError::ListNotFound));

        assert_eq!(ks.lindex("list", 0), Ok("a".to_string()));
        assert_eq!(ks.lindex("list", -1), Ok("c".to_string()));
        assert_eq!(ks.lindex("list", 3), Err(KvError::IndexOutOfRange));
        assert_eq!(ks.lindex("list", -4), Err(KvError::IndexOutOfRange));
    }

    #[test]
    fn test_lset() {
        let ks = keyspace_with("list", &["a", "b"]);
        assert_eq!(ks.lset("list", -1, "z".into()), Ok(()));
        assert_eq!(ks.lset("list", 5, "z".into()), Err(KvError::IndexOutOfRange));
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["a", "z"])));
    }

    #[test]
    fn test_lrange() {
        let ks = keyspace_with("list", &["a", "b", "c", "d"]);
        assert_eq!(ks.lrange("list", 1, 2), Ok(strings(&["b", "c"])));
        assert_eq!(ks.lrange("list", -3, -2), Ok(strings(&["b", "c"])));
        assert_eq!(ks.lrange("list", 2, 100), Ok(strings(&["c", "d"])));
        assert_eq!(ks.lrange("list", 3, 1), Ok(vec![]));
        assert_eq!(ks.lrange("missing", 0, -1), Err(KvError::ListNotFound));
    }

    #[test]
    fn test_ltrim() {
        let ks = keyspace_with("list", &["a", "b", "c", "d", "e"]);
        ks.ltrim("list", 1, -2).unwrap();
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["b", "c", "d"])));

        ks.ltrim("list", 5, 10).unwrap();
        assert_eq!(ks.exists(&["list"]), 0);
    }

    #[test]
    fn test_linsert() {
        let ks = keyspace_with("list", &["a", "b", "c", "d"]);
        assert_eq!(ks.linsert("list", InsertPosition::Before, "b", "x".into()), Ok(5));
        assert_eq!(ks.lindex("list", 1), Ok("x".to_string()));

        assert_eq!(ks.linsert("list", InsertPosition::After, "x", "y".into()), Ok(6));
        assert_eq!(ks.lindex("list", 2), Ok("y".to_string()));

        assert_eq!(ks.linsert("list", InsertPosition::After, "nope", "z".into()), Ok(-1));
        assert_eq!(
            ks.lrange("list", 0, -1),
            Ok(strings(&["a", "x", "y", "b", "c", "d"]))
        );
    }

    #[test]
    fn test_parse_positions() {
        assert_eq!("before".parse::<InsertPosition>(), Ok(InsertPosition::Before));
        assert_eq!("AFTER".parse::<InsertPosition>(), Ok(InsertPosition::After));
        assert_eq!("middle".parse::<InsertPosition>(), Err(KvError::Syntax));
        assert_eq!("Left".parse::<ListEnd>(), Ok(ListEnd::Left));
        assert_eq!("up".parse::<ListEnd>(), Err(KvError::Syntax));
    }

    #[test]
    fn test_lrem() {
        let ks = keyspace_with("list", &["a", "x", "b", "x", "c", "x"]);
        assert_eq!(ks.lrem("list", 1, "x"), Ok(1));
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["a", "b", "x", "c", "x"])));

        assert_eq!(ks.lrem("list", -1, "x"), Ok(1));
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["a", "b", "x", "c"])));

        assert_eq!(ks.lrem("list", 0, "x"), Ok(1));
        assert_eq!(ks.lrem("list", 0, "nope"), Ok(0));
        assert_eq!(ks.lrange("list", 0, -1), Ok(strings(&["a", "b", "c"])));
    }

    #[test]
    fn test_lmove_between_lists() {
        let ks = keyspace_with("src", &["a", "b", "c"]);
        assert_eq!(ks.lmove("src", "dst", ListEnd::Right, ListEnd::Left), Ok("c".to_string()));
        assert_eq!(ks.lmove("src", "dst", ListEnd::Left, ListEnd::Right), Ok("a".to_string()));

        assert_eq!(ks.lrange("src", 0, -1), Ok(strings(&["b"])));
        assert_eq!(ks.lrange("dst", 0, -1), Ok(strings(&["c", "a"])));

        ks.lmove("src", "dst", ListEnd::Left, ListEnd::Left).unwrap();
        assert_eq!(ks.exists(&["src"]), 0);
        assert_eq!(
            ks.lmove("src", "dst", ListEnd::Left, ListEnd::Left),
            Err(KvError::ListNotFound)
        );
    }

    #[test]
    fn test_lmove_rotates_same_list() {
        let ks = keyspace_with("l", &["a", "b", "c"]);
        ks.lmove("l", "l", ListEnd::Left, ListEnd::Right).unwrap();
        assert_eq!(ks.lrange("l", 0, -1), Ok(strings(&["b", "c", "a"])));

        let single = keyspace_with("one", &["x"]);
        single.lmove("one", "one", ListEnd::Left, ListEnd::Right).unwrap();
        assert_eq!(single.lrange("one", 0, -1), Ok(strings(&["x"])));
    }

    #[test]
    fn test_lmove_into_wrong_shape_leaves_source() {
        let ks = keyspace_with("src", &["a"]);
        ks.set("dst", "string".into());
        assert_eq!(
            ks.lmove("src", "dst", ListEnd::Left, ListEnd::Left),
            Err(KvError::ListNotFound)
        );
        assert_eq!(ks.llen("src"), Ok(1));
    }
}
