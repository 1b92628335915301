//! In-memory record sink for testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{StoredRecord, resolve_records};
use crate::application::ports::{RecordSink, SinkError, StoreReport};
use crate::domain::sampling::SyncRound;
use crate::domain::symbol::SymbolTranslation;

/// In-memory implementation of `RecordSink`.
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemorySink {
    translation: SymbolTranslation,
    records: Mutex<Vec<StoredRecord>>,
    rounds: Mutex<Vec<u64>>,
}

impl InMemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new(translation: SymbolTranslation) -> Self {
        Self {
            translation,
            records: Mutex::new(Vec::new()),
            rounds: Mutex::new(Vec::new()),
        }
    }

    /// Records stored so far, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().clone()
    }

    /// Round numbers received so far.
    #[must_use]
    pub fn rounds(&self) -> Vec<u64> {
        self.rounds.lock().clone()
    }
}

#[async_trait]
impl RecordSink for InMemorySink {
    async fn store_round(&self, round: &SyncRound) -> Result<StoreReport, SinkError> {
        let (records, rejected) = resolve_records(round, &self.translation);
        let stored = records.len();

        self.records.lock().extend(records);
        self.rounds.lock().push(round.round);

        Ok(StoreReport { stored, rejected })
    }
}
