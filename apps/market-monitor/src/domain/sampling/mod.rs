//! Sampling Output
//!
//! Batches emitted by a connector's scheduler and the lock-step rounds the
//! synchronizer assembles from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metrics::CalcResult;

/// One sampling tick of one connector: metrics for every subscribed market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    /// Exchange name.
    pub source: String,
    /// Metrics keyed by exchange-native market.
    pub data: BTreeMap<String, CalcResult>,
}

impl SourceBatch {
    /// Create an empty batch for a source.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            data: BTreeMap::new(),
        }
    }

    /// Add one market's result.
    pub fn insert(&mut self, market: impl Into<String>, result: CalcResult) {
        self.data.insert(market.into(), result);
    }

    /// Total trades across all markets in the batch.
    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.data.values().map(|r| r.trade_count).sum()
    }
}

/// One batch from every connector, ordered as the connectors were registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRound {
    /// Strictly increasing round number, starting at 1.
    pub round: u64,
    /// Batches in registration order.
    pub batches: Vec<SourceBatch>,
}

impl SyncRound {
    /// Number of (source, market) records in the round.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.data.len()).sum()
    }
}
