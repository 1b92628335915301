//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Inbound frames by source and kind, side-filtered trades
//! - **Sampling**: Batches per source, synchronized rounds
//! - **Persistence**: Records stored and rejected, sink failures
//! - **Connectors**: Session state gauge and clean closes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::{MonitorObserver, StoreReport, StreamEnd};
use crate::domain::sampling::SyncRound;
use crate::domain::session::ConnectorState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Repeated calls return the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_monitor_frames_received_total",
        "Total frames received from exchange streams by kind"
    );
    describe_counter!(
        "market_monitor_trades_filtered_total",
        "Trades discarded by the side filter"
    );
    describe_counter!(
        "market_monitor_batches_total",
        "Sampling batches emitted per source"
    );
    describe_counter!(
        "market_monitor_rounds_total",
        "Synchronized rounds assembled"
    );
    describe_counter!(
        "market_monitor_records_stored_total",
        "Records written by the persistence sink"
    );
    describe_counter!(
        "market_monitor_records_rejected_total",
        "Records rejected for lack of a symbol translation"
    );
    describe_counter!(
        "market_monitor_sink_errors_total",
        "Rounds the persistence sink failed to store"
    );
    describe_counter!(
        "market_monitor_clean_closes_total",
        "Exchange streams closed cleanly by the peer"
    );
    describe_gauge!(
        "market_monitor_connector_state",
        "Connector lifecycle state code (4 = streaming)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Top-of-book update.
    Ticker,
    /// Trade appended to a window.
    Trade,
    /// Trade dropped by the side filter.
    FilteredTrade,
    /// Protocol control message.
    Control,
    /// Frame with no matching shape or market.
    Unroutable,
}

impl FrameKind {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trade => "trade",
            Self::FilteredTrade => "filtered_trade",
            Self::Control => "control",
            Self::Unroutable => "unroutable",
        }
    }
}

/// Record a frame received from an exchange.
pub fn record_frame(source: &str, kind: FrameKind) {
    counter!(
        "market_monitor_frames_received_total",
        "source" => source.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);

    if kind == FrameKind::FilteredTrade {
        counter!(
            "market_monitor_trades_filtered_total",
            "source" => source.to_string()
        )
        .increment(1);
    }
}

/// Update the connector state gauge.
pub fn set_connector_state(source: &str, state: ConnectorState) {
    gauge!(
        "market_monitor_connector_state",
        "source" => source.to_string()
    )
    .set(f64::from(state.code()));
}

/// Record a synchronized round and its per-source batches.
pub fn record_round(round: &SyncRound) {
    counter!("market_monitor_rounds_total").increment(1);
    for batch in &round.batches {
        counter!(
            "market_monitor_batches_total",
            "source" => batch.source.clone()
        )
        .increment(1);
    }
}

/// Record the outcome of storing a round.
pub fn record_store(report: StoreReport) {
    counter!("market_monitor_records_stored_total").increment(report.stored as u64);
    counter!("market_monitor_records_rejected_total").increment(report.rejected as u64);
}

/// Record a failed store.
pub fn record_sink_error() {
    counter!("market_monitor_sink_errors_total").increment(1);
}

/// Record a clean close by the peer.
pub fn record_clean_close(source: &str) {
    counter!(
        "market_monitor_clean_closes_total",
        "source" => source.to_string()
    )
    .increment(1);
}

// =============================================================================
// Observer Adapter
// =============================================================================

/// Forwards monitor events to the Prometheus recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusObserver;

impl MonitorObserver for PrometheusObserver {
    fn on_state(&self, source: &str, state: ConnectorState) {
        set_connector_state(source, state);
    }

    fn on_round(&self, round: &SyncRound) {
        record_round(round);
    }

    fn on_stored(&self, report: StoreReport) {
        record_store(report);
    }

    fn on_sink_error(&self) {
        record_sink_error();
    }

    fn on_stream_end(&self, source: &str, end: StreamEnd) {
        match end {
            StreamEnd::CleanClose { .. } => record_clean_close(source),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_kind_as_str() {
        assert_eq!(FrameKind::Ticker.as_str(), "ticker");
        assert_eq!(FrameKind::Trade.as_str(), "trade");
        assert_eq!(FrameKind::FilteredTrade.as_str(), "filtered_trade");
        assert_eq!(FrameKind::Control.as_str(), "control");
        assert_eq!(FrameKind::Unroutable.as_str(), "unroutable");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame("binance", FrameKind::Ticker);
        record_store(StoreReport {
            stored: 2,
            rejected: 1,
        });
        PrometheusObserver.on_state("binance", ConnectorState::Streaming);
    }
}
