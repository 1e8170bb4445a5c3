//! Storage Layer
//!
//! This module provides the building blocks every data type is built on:
//! a bounded key-value store with TTL and LRU eviction, the per-key lock
//! table, the background expiry sweeper, and the ring-buffer deque that
//! backs lists.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │      KeyLocks        │      │        StorageEngine         │
//! │  key -> RwLock<()>   │      │  Mutex<map + LRU index>      │
//! │  (sorted acquisition)│      │  Entry { Value, expires_at } │
//! └──────────────────────┘      └──────────────▲───────────────┘
//!                                              │ sample + reap
//!                               ┌──────────────┴───────────────┐
//!                               │        ExpirySweeper         │
//!                               │   (background std thread)    │
//!                               └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tidekv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine, Value};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//! engine.set("name", Value::from("tide"));
//! assert_eq!(engine.get("name"), Some(Value::from("tide")));
//!
//! let sweeper = ExpirySweeper::new(Arc::clone(&engine), ExpiryConfig::default());
//! sweeper.start().unwrap();
//! sweeper.stop();
//! ```

pub mod deque;
pub mod engine;
pub mod expiry;
pub mod locks;
pub mod value;

// Re-export commonly used types
pub use deque::Deque;
pub use engine::{unix_now, Entry, StorageEngine, StorageStats, StoreConfig, DEFAULT_MAX_KEYS};
pub use expiry::{sweep, ExpiryConfig, ExpirySweeper, SweepReport};
pub use locks::{KeyLocks, ReadGuard, WriteGuard};
pub use value::Value;
