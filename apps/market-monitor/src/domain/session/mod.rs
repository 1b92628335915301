//! Connector Session State
//!
//! Lifecycle of one exchange streaming session, published through a shared
//! [`ConnectorStatus`] cell so the health endpoint and the monitor can observe
//! it without owning the connector.
//!
//! ```text
//! Disconnected → Connecting → Authenticating → Subscribing → Streaming → Closed
//!                     │              │               │            │
//!                     └──────────────┴───────────────┴────────────┴──→ Failed
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Connector lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorState {
    /// No transport yet.
    #[default]
    Disconnected,
    /// Opening the transport (and bootstrapping, where required).
    Connecting,
    /// Waiting for the authentication acknowledgement.
    Authenticating,
    /// Sending subscriptions and waiting for their acknowledgements.
    Subscribing,
    /// Decoding market data.
    Streaming,
    /// Remote peer closed the session cleanly.
    Closed,
    /// Setup or transport failure.
    Failed,
}

impl ConnectorState {
    /// State name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Numeric code exported as a gauge.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Authenticating => 2,
            Self::Subscribing => 3,
            Self::Streaming => 4,
            Self::Closed => 5,
            Self::Failed => 6,
        }
    }

    /// Whether the session ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable status of one connector.
#[derive(Debug)]
pub struct ConnectorStatus {
    source: String,
    state: RwLock<ConnectorState>,
    last_error: RwLock<Option<String>>,
    frames_received: AtomicU64,
}

impl ConnectorStatus {
    /// Create status for a source in `Disconnected` state.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: RwLock::new(ConnectorState::Disconnected),
            last_error: RwLock::new(None),
            frames_received: AtomicU64::new(0),
        }
    }

    /// Exchange name.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    /// Transition to a new state, returning the previous one.
    pub fn transition(&self, next: ConnectorState) -> ConnectorState {
        std::mem::replace(&mut *self.state.write(), next)
    }

    /// Transition to `Failed` and remember why.
    pub fn fail(&self, reason: impl Into<String>) {
        *self.last_error.write() = Some(reason.into());
        self.transition(ConnectorState::Failed);
    }

    /// Last failure reason, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Count one inbound frame.
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames received since start.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let status = ConnectorStatus::new("kucoin");
        assert_eq!(status.source(), "kucoin");
        assert_eq!(status.state(), ConnectorState::Disconnected);
        assert!(status.last_error().is_none());
    }

    #[test]
    fn transition_returns_previous() {
        let status = ConnectorStatus::new("kucoin");
        assert_eq!(
            status.transition(ConnectorState::Connecting),
            ConnectorState::Disconnected
        );
        assert_eq!(status.state(), ConnectorState::Connecting);
    }

    #[test]
    fn fail_records_reason() {
        let status = ConnectorStatus::new("kucoin");
        status.fail("ack timeout");
        assert_eq!(status.state(), ConnectorState::Failed);
        assert_eq!(status.last_error().as_deref(), Some("ack timeout"));
        assert!(status.state().is_terminal());
    }

    #[test]
    fn counts_frames() {
        let status = ConnectorStatus::new("binance");
        status.record_frame();
        status.record_frame();
        assert_eq!(status.frames_received(), 2);
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectorState::Streaming.to_string(), "streaming");
        assert_eq!(ConnectorState::Failed.code(), 6);
        assert!(!ConnectorState::Streaming.is_terminal());
    }
}
