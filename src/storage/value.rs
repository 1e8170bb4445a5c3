//! Stored Value Shapes
//!
//! The store holds one of four shapes per key. The store itself never looks
//! inside a value; the keyspace modules match on the variant they expect.

use super::deque::Deque;
use std::collections::{HashMap, HashSet};

/// A value held under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Hash(HashMap<String, String>),
    List(Deque<String>),
    Set(HashSet<String>),
}

impl Value {
    /// Name reported by the `TYPE` command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<String, String>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Deque<String>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Rough heap footprint, used by `INFO`.
    pub fn approximate_size(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Hash(h) => h.iter().map(|(k, v)| k.len() + v.len()).sum(),
            Value::List(l) => l.iter().map(String::len).sum(),
            Value::Set(s) => s.iter().map(String::len).sum(),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}
