//! Keyspace
//!
//! The [`Keyspace`] is what command handlers talk to. It owns the bounded
//! store, the per-key lock table and the expiry sweeper, and implements the
//! data-type operations on top of them:
//!
//! - [`generic`]: COPY, DEL, EXISTS, EXPIRE family, KEYS, TTL, TYPE
//! - [`strings`]: GET/SET and friends, INCR family, GETRANGE, SETRANGE, LCS
//! - [`hashes`]: HSET, HGET, HDEL, HGETALL, HEXPIRE
//! - [`lists`]: push/pop at both ends, LRANGE, LINSERT, LMOVE, LTRIM
//! - [`sets`]: SADD, SCARD, SISMEMBER, SDIFF
//!
//! ## Locking discipline
//!
//! Every public method takes the locks of all keys it touches before its
//! first store access, through a single [`KeyLocks::read`] or
//! [`KeyLocks::write`] call, and releases them when it returns. Methods never
//! call another locking method while holding a guard.

pub mod generic;
pub mod hashes;
pub mod lists;
pub mod sets;
pub mod strings;

pub use generic::ExpireCondition;
pub use lists::{InsertPosition, ListEnd};

use crate::storage::{ExpiryConfig, ExpirySweeper, KeyLocks, StorageEngine, StoreConfig};
use std::sync::Arc;

/// Shared state behind every connection.
#[derive(Debug)]
pub struct Keyspace {
    engine: Arc<StorageEngine>,
    locks: KeyLocks,
    sweeper: ExpirySweeper,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(StoreConfig::default(), ExpiryConfig::default())
    }
}

impl Keyspace {
    /// Creates an empty keyspace. The sweeper is created stopped.
    pub fn new(store: StoreConfig, expiry: ExpiryConfig) -> Self {
        let engine = Arc::new(StorageEngine::with_config(store));
        let sweeper = ExpirySweeper::new(Arc::clone(&engine), expiry);
        Self {
            engine,
            locks: KeyLocks::new(),
            sweeper,
        }
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    pub fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    pub fn sweeper(&self) -> &ExpirySweeper {
        &self.sweeper
    }

    /// Starts active expiry.
    pub fn start_expiry(&self) -> std::io::Result<()> {
        self.sweeper.start()
    }

    /// Stops active expiry and waits for the sweeper thread.
    pub fn stop_expiry(&self) {
        self.sweeper.stop();
    }
}
