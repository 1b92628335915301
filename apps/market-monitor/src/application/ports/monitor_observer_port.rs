//! Monitor Observer Port (Driven Port)
//!
//! Pipeline events published by the monitor so metrics and health adapters
//! can follow a run without the services depending on them.

use crate::application::ports::{StoreReport, StreamEnd};
use crate::domain::sampling::SyncRound;
use crate::domain::session::ConnectorState;

/// Receives pipeline events. All methods default to no-ops.
pub trait MonitorObserver: Send + Sync {
    /// A connector changed state.
    fn on_state(&self, _source: &str, _state: ConnectorState) {}

    /// A synchronized round was assembled.
    fn on_round(&self, _round: &SyncRound) {}

    /// A round was handed to the sink.
    fn on_stored(&self, _report: StoreReport) {}

    /// The sink failed to store a round.
    fn on_sink_error(&self) {}

    /// A decode loop ended with a clean close.
    fn on_stream_end(&self, _source: &str, _end: StreamEnd) {}
}

/// No-op observer for testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl MonitorObserver for NoOpObserver {}
