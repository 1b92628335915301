//! Record Sink Port (Driven Port)
//!
//! Storage for synchronized rounds.

use async_trait::async_trait;

use crate::domain::sampling::SyncRound;

/// Sink error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// Database error.
    #[error("database error: {message}")]
    Database {
        /// Error details.
        message: String,
    },

    /// Storage could not be prepared.
    #[error("sink initialization failed: {message}")]
    Init {
        /// Error details.
        message: String,
    },
}

/// Outcome of storing one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreReport {
    /// Records written.
    pub stored: usize,
    /// Records dropped for lack of a symbol translation.
    pub rejected: usize,
}

/// Port for persisting synchronized rounds.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store every (source, market) record of a round.
    ///
    /// Records without a symbol translation are rejected and counted, never
    /// failing the call.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the backing store fails.
    async fn store_round(&self, round: &SyncRound) -> Result<StoreReport, SinkError>;
}
