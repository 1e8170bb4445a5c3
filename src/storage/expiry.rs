//! Background Expiry Sweeper
//!
//! This module implements "active expiry": a background thread that
//! periodically reaps expired keys, as opposed to "lazy expiry" which only
//! happens when a key is accessed.
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry is cheap but a key that expires and is never read again would
//! otherwise occupy a slot in the store forever.
//!
//! ## Design
//!
//! On every tick (default: 100ms) the sweeper runs up to `max_iterations`
//! sampling rounds. Each round:
//! 1. Picks up to `sample_size` random keys
//! 2. Removes the ones that are expired
//! 3. Stops early if fewer than `target_percent` of the sample were expired
//!
//! A store full of expired keys is therefore drained quickly, while a store
//! with few of them costs at most one small sample per tick.
//!
//! ## Lifecycle
//!
//! The sweeper is an explicit handle. [`ExpirySweeper::start`] and
//! [`ExpirySweeper::stop`] are both idempotent; stopping closes the channel
//! the loop selects on next to its ticker and joins the thread. Dropping the
//! handle stops it.

use crate::storage::StorageEngine;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between ticks (default: 100ms)
    pub interval: Duration,

    /// Keys sampled per round (default: 20)
    pub sample_size: usize,

    /// Keep sampling while at least this percentage of a sample was expired
    pub target_percent: f64,

    /// Upper bound on rounds per tick (default: 3)
    pub max_iterations: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            sample_size: 20,
            target_percent: 25.0,
            max_iterations: 3,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rounds: usize,
    pub sampled: usize,
    pub expired: usize,
}

struct Running {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// A handle to the background expiry thread.
pub struct ExpirySweeper {
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweeper")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ExpirySweeper {
    /// Creates a stopped sweeper for `engine`.
    pub fn new(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        Self {
            engine,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Starts the background thread. Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// Fails only if the OS refuses to spawn the thread.
    pub fn start(&self) -> std::io::Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = channel::bounded(0);
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("expiry-sweeper".into())
            .spawn(move || sweeper_loop(engine, config, stop_rx))?;

        *running = Some(Running { stop_tx, handle });
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        Ok(())
    }

    /// Stops the background thread and waits for it to exit. Does nothing if
    /// it is not running.
    pub fn stop(&self) {
        let Some(Running { stop_tx, handle }) = self.running.lock().take() else {
            return;
        };

        drop(stop_tx);
        if handle.join().is_err() {
            warn!("Expiry sweeper thread panicked");
        }
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
fn sweeper_loop(engine: Arc<StorageEngine>, config: ExpiryConfig, stop_rx: Receiver<()>) {
    let ticker = channel::tick(config.interval);

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                let report = sweep(&engine, &config);
                if report.expired > 0 {
                    debug!(
                        expired = report.expired,
                        rounds = report.rounds,
                        keys_remaining = engine.len(),
                        "Expired keys cleaned up"
                    );
                }
            }
            recv(stop_rx) -> _ => {
                debug!("Expiry sweeper received shutdown signal");
                return;
            }
        }
    }
}

/// Runs one tick worth of sampling rounds against `engine`.
pub fn sweep(engine: &StorageEngine, config: &ExpiryConfig) -> SweepReport {
    let mut report = SweepReport::default();

    for _ in 0..config.max_iterations {
        let sample = engine.sample_keys(config.sample_size);
        if sample.is_empty() {
            break;
        }

        let expired = sample
            .iter()
            .filter(|key| engine.remove_if_expired(key))
            .count();

        report.rounds += 1;
        report.sampled += sample.len();
        report.expired += expired;

        let percent = expired as f64 / sample.len() as f64 * 100.0;
        trace!(sampled = sample.len(), expired, percent, "Expiry round");
        if percent < config.target_percent {
            break;
        }
    }

    report
}
