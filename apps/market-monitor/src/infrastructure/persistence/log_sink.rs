//! Log Sink
//!
//! Emits one structured log line per stored record. Useful when no database
//! is wanted, e.g. piping the output into a log collector.

use async_trait::async_trait;

use super::resolve_records;
use crate::application::ports::{RecordSink, SinkError, StoreReport};
use crate::domain::sampling::SyncRound;
use crate::domain::symbol::SymbolTranslation;

/// `RecordSink` that writes records to the tracing subscriber.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    translation: SymbolTranslation,
}

impl LogSink {
    /// Create a log sink.
    #[must_use]
    pub const fn new(translation: SymbolTranslation) -> Self {
        Self { translation }
    }
}

#[async_trait]
impl RecordSink for LogSink {
    async fn store_round(&self, round: &SyncRound) -> Result<StoreReport, SinkError> {
        let (records, rejected) = resolve_records(round, &self.translation);

        for record in &records {
            let json = serde_json::to_string(record).map_err(|e| SinkError::Database {
                message: e.to_string(),
            })?;
            tracing::info!(round = round.round, record = %json, "Market record");
        }

        Ok(StoreReport {
            stored: records.len(),
            rejected,
        })
    }
}
