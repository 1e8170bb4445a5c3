//! # tidekv
//!
//! An in-memory, Redis-style data-structure server. Values are strings,
//! hashes, lists or sets; keys can carry a TTL and the store holds a bounded
//! number of keys, evicting the least recently used one when full.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                tidekv                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐               │
//! │  │ TCP accept  │───>│ Connection  │───>│ CommandHandler │               │
//! │  │  (main.rs)  │    │ RESP parser │    │  arity+dispatch│               │
//! │  └─────────────┘    └─────────────┘    └───────┬────────┘               │
//! │                                                │                        │
//! │                                                ▼                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │ Keyspace                                                         │   │
//! │  │   KeyLocks (per-key RwLock, sorted acquisition)                  │   │
//! │  │   StorageEngine (HashMap + LRU index + TTL, one Mutex)           │   │
//! │  │   ExpirySweeper (background thread sampling random keys)         │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```
//! use tidekv::Keyspace;
//!
//! let keyspace = Keyspace::default();
//! keyspace.set("greeting", "hello".to_string());
//! assert_eq!(keyspace.get("greeting").unwrap(), "hello");
//!
//! keyspace.rpush("queue", vec!["a".into(), "b".into()]).unwrap();
//! assert_eq!(keyspace.lpop("queue", 1).unwrap(), vec!["a".to_string()]);
//! ```
//!
//! ## Modules
//!
//! - [`storage`]: bounded store, deque, per-key locks, active expiry
//! - [`keyspace`]: typed and generic operations with locking
//! - [`commands`]: RESP request to keyspace call
//! - [`protocol`]: RESP2 values and parser
//! - [`connection`]: per-client async loop
//! - [`config`]: command-line flags
//! - [`error`]: [`KvError`], the error every operation reports
//!
//! ## Expiry
//!
//! Expired keys are hidden on read (lazy) and removed in the background by
//! sampling random keys and reaping the expired ones (active), so memory is
//! reclaimed for keys that are never read again.

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod keyspace;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use error::{KvError, KvResult};
pub use keyspace::Keyspace;
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine, StoreConfig};

/// Default listening port, the same as Redis.
pub const DEFAULT_PORT: u16 = 6379;

pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
