//! Background Expiry Sweeper
//!
//! Paste keys with a TTL are given a store-level expiry (TTL plus the
//! eviction grace). Lazy expiry only reclaims keys somebody reads again, and
//! most expired pastes are never requested, so this task periodically drops
//! them from the engine.
//!
//! The interval adapts: it halves when a large share of keys turned out to
//! be expired and doubles while sweeps find nothing.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval before the first sweep (default: 100ms)
    pub base_interval: Duration,

    /// Fastest sweep rate (default: 10ms)
    pub min_interval: Duration,

    /// Slowest sweep rate (default: 1s)
    pub max_interval: Duration,

    /// Speed up when more than this fraction of keys was expired
    pub speedup_threshold: f64,

    /// Slow down when less than this fraction of keys was expired
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

impl ExpiryConfig {
    /// Picks the next sleep interval from the outcome of a sweep.
    pub fn next_interval(&self, current: Duration, keys_before: u64, expired: u64) -> Duration {
        if keys_before == 0 {
            return (current * 2).min(self.max_interval);
        }

        let expiry_rate = expired as f64 / keys_before as f64;
        if expiry_rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if expiry_rate < self.slowdown_threshold && expired == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// Handle to the running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));
        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
        debug!("Background expiry sweeper stopped");
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = engine.len();
        let expired = engine.cleanup_expired();
        current_interval = config.next_interval(current_interval, keys_before, expired);

        if expired > 0 {
            let stats = engine.stats();
            debug!(
                expired = expired,
                keys_remaining = stats.keys,
                expired_total = stats.expired,
                next_sweep_ms = current_interval.as_millis() as u64,
                "Evicted expired paste keys"
            );
        } else {
            trace!(next_sweep_ms = current_interval.as_millis() as u64, "Nothing to evict");
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
