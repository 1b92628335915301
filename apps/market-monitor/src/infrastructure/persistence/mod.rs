//! Persistence Adapters
//!
//! Implementations of `RecordSink`. Every sink flattens a round into one
//! record per (exchange, market) pair, translating the native market to its
//! canonical symbol; pairs without a translation are rejected.

pub mod log_sink;
pub mod memory_sink;
pub mod turso_sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use log_sink::LogSink;
pub use memory_sink::InMemorySink;
pub use turso_sink::TursoSink;

use crate::domain::sampling::SyncRound;
use crate::domain::symbol::SymbolTranslation;

/// One stored (exchange, market) row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Exchange name.
    pub exchange: String,
    /// Canonical market, e.g. `BTC/USDT`.
    pub market: String,
    /// Spread in percent.
    pub spread: Option<f64>,
    /// Mean qualifying slippage in percent.
    pub slippage: Option<f64>,
    /// Trades in the window.
    pub volume: usize,
    /// Sampling time.
    pub timestamp: DateTime<Utc>,
}

/// Flatten a round into translated records.
///
/// Returns the records and the number of rejected pairs.
#[must_use]
pub fn resolve_records(round: &SyncRound, translation: &SymbolTranslation) -> (Vec<StoredRecord>, usize) {
    let mut records = Vec::with_capacity(round.record_count());
    let mut rejected = 0;

    for batch in &round.batches {
        for (native, result) in &batch.data {
            let Some(canonical) = translation.canonical(&batch.source, native) else {
                tracing::warn!(
                    source = %batch.source,
                    market = %native,
                    round = round.round,
                    "No symbol translation, record rejected"
                );
                rejected += 1;
                continue;
            };

            records.push(StoredRecord {
                exchange: batch.source.clone(),
                market: canonical.to_string(),
                spread: result.spread,
                slippage: result.slippage,
                volume: result.trade_count,
                timestamp: result.timestamp,
            });
        }
    }

    (records, rejected)
}
