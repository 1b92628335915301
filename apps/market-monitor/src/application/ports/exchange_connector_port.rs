//! Exchange Connector Port (Driven Port)
//!
//! One streaming session to one exchange. A connector first drives its
//! session to `Streaming` through [`ExchangeConnector::connect`], then runs
//! [`ExchangeConnector::decode_loop`] until the session ends.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::market::MarketStore;
use crate::domain::session::ConnectorStatus;

/// Failure while establishing a session. Fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// Bootstrap request could not be sent or decoded.
    #[error("bootstrap request failed: {0}")]
    Bootstrap(String),

    /// Bootstrap endpoint answered with a non-success status.
    #[error("bootstrap returned HTTP {0}")]
    BootstrapStatus(u16),

    /// Bootstrap response carried no token.
    #[error("bootstrap response has no session token")]
    MissingToken,

    /// Bootstrap response listed no server endpoint.
    #[error("bootstrap response has no instance server")]
    NoInstanceServer,

    /// WebSocket open failed.
    #[error("websocket open failed: {0}")]
    Open(String),

    /// No acknowledgement of the expected type within the timeout.
    #[error("no '{expected}' acknowledgement within {timeout_ms}ms")]
    AckTimeout {
        /// Expected message type.
        expected: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// Peer closed the socket during the handshake.
    #[error("connection closed during handshake")]
    ClosedDuringHandshake,

    /// Socket error during the handshake.
    #[error("transport error during handshake: {0}")]
    Transport(String),

    /// Outbound handshake frame could not be encoded.
    #[error("failed to encode handshake frame: {0}")]
    Encode(String),
}

/// Failure while streaming. Fatal for the whole monitor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Socket-level error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Frame was not JSON, or a ticker/trade frame had unparsable numbers.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Peer closed with a code other than normal or going-away.
    #[error("unexpected close (code {code}): {reason}")]
    UnexpectedClose {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },

    /// Stream ended without a close frame.
    #[error("stream ended without close frame")]
    StreamEnded,

    /// Decode loop started before `connect` succeeded.
    #[error("not connected")]
    NotConnected,
}

/// Connector failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// Session could not be established.
    #[error("setup failure: {0}")]
    Setup(#[from] SetupError),

    /// Session broke while streaming.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl ConnectorError {
    /// Whether the error happened during setup.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

/// How a decode loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Peer closed the session cleanly. Market state stays frozen.
    CleanClose {
        /// Close code, if the peer sent one.
        code: Option<u16>,
    },
}

/// Port for one exchange streaming session.
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// Exchange name, used as the batch source.
    fn source(&self) -> &str;

    /// Markets this connector writes.
    fn store(&self) -> Arc<MarketStore>;

    /// Observable session state.
    fn status(&self) -> Arc<ConnectorStatus>;

    /// Drive the session to `Streaming`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Setup`] if any step fails. No partially
    /// set-up session is kept.
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Decode inbound frames into the store until the session ends.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Transport`] on anything but a clean close.
    async fn decode_loop(&mut self) -> Result<StreamEnd, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_convert() {
        let err: ConnectorError = SetupError::AckTimeout {
            expected: "welcome".to_string(),
            timeout_ms: 1000,
        }
        .into();

        assert!(err.is_setup());
        assert_eq!(
            err.to_string(),
            "setup failure: no 'welcome' acknowledgement within 1000ms"
        );
    }

    #[test]
    fn transport_errors_convert() {
        let err: ConnectorError = TransportError::UnexpectedClose {
            code: 1011,
            reason: "internal".to_string(),
        }
        .into();

        assert!(!err.is_setup());
        assert!(err.to_string().contains("1011"));
    }
}
