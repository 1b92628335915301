//! Sampling Scheduler
//!
//! Per-connector timer loop. Every interval it stamps, computes and resets
//! each market of the connector's store and emits one [`SourceBatch`].
//!
//! The loop sleeps a full interval after every emission, so a late wake-up
//! shifts later ticks instead of firing catch-up ticks. Batches go into an
//! unbounded channel: a slow consumer makes batches queue, never slows
//! sampling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::market::{MarketStore, ResetPolicy, SnapshotMode};
use crate::domain::metrics::compute;
use crate::domain::sampling::SourceBatch;

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// What each tick clears after computing.
    pub reset: ResetPolicy,
    /// Isolation from concurrent decoding.
    pub mode: SnapshotMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            reset: ResetPolicy::default(),
            mode: SnapshotMode::default(),
        }
    }
}

/// Sampling loop for one connector's store.
#[derive(Debug)]
pub struct SamplingScheduler {
    source: String,
    store: Arc<MarketStore>,
    config: SchedulerConfig,
}

impl SamplingScheduler {
    /// Create a scheduler over a connector's store.
    #[must_use]
    pub fn new(source: impl Into<String>, store: Arc<MarketStore>, config: SchedulerConfig) -> Self {
        Self {
            source: source.into(),
            store,
            config,
        }
    }

    /// Source name stamped on every batch.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sample every market at the given time.
    ///
    /// Compute and reset happen under the same market lock, so no trade
    /// lands between a window's computation and its clearing.
    #[must_use]
    pub fn sample_at(&self, now: DateTime<Utc>) -> SourceBatch {
        let mut batch = SourceBatch::new(self.source.as_str());
        let reset = self.config.reset;

        self.store.for_each_market(self.config.mode, |state| {
            state.stamp(now);
            let result = compute(state, now);
            state.reset(reset);
            batch.insert(state.market(), result);
        });

        batch
    }

    /// Sample every market now.
    #[must_use]
    pub fn sample(&self) -> SourceBatch {
        self.sample_at(Utc::now())
    }

    /// Run until cancelled or until the receiver is dropped.
    pub async fn run(self, tx: mpsc::UnboundedSender<SourceBatch>, cancel: CancellationToken) {
        tracing::debug!(
            source = %self.source,
            interval_ms = self.config.interval.as_millis(),
            mode = self.config.mode.as_str(),
            "Sampling scheduler started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }

            let batch = self.sample();
            tracing::trace!(
                source = %self.source,
                markets = batch.data.len(),
                trades = batch.trade_count(),
                "Batch sampled"
            );

            if tx.send(batch).is_err() {
                tracing::debug!(source = %self.source, "Batch receiver dropped");
                break;
            }
        }

        tracing::debug!(source = %self.source, "Sampling scheduler stopped");
    }
}
