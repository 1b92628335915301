//! Streaming Decode Loop
//!
//! Shared `Streaming`-state loop: read frames, decode them with the
//! exchange's decoder, route the events into the store, and optionally send
//! an application-level keep-alive on a fixed period.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};

use super::codec::{MarketEvent, parse_frame, route};
use super::session::{Inbound, WsStream, close_quietly, next_inbound, send_text};
use crate::application::ports::{ConnectorError, StreamEnd, TransportError};
use crate::domain::market::MarketStore;
use crate::domain::session::{ConnectorState, ConnectorStatus};

/// Exchange-specific frame decoder.
pub type Decoder = fn(&Value) -> Result<MarketEvent, TransportError>;

/// Periodic application-level keep-alive.
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    /// Time between keep-alive frames.
    pub interval: Duration,
    /// Builds the keep-alive frame.
    pub frame: fn() -> Result<String, serde_json::Error>,
}

/// Decode frames until the session ends.
///
/// # Errors
///
/// Returns a [`TransportError`] for malformed frames, unexpected closes and
/// socket failures.
pub async fn stream_frames(
    ws: &mut WsStream,
    source: &str,
    store: &MarketStore,
    status: &ConnectorStatus,
    decode: Decoder,
    keepalive: Option<KeepAlive>,
) -> Result<StreamEnd, TransportError> {
    let mut timer = keepalive.map(|k| {
        let mut timer = tokio::time::interval_at(Instant::now() + k.interval, k.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        (timer, k.frame)
    });

    loop {
        // `next_inbound` may be dropped mid-pong; tungstenite keeps queued
        // frames and flushes them on the next send or read.
        let inbound = match timer.as_mut() {
            Some((timer, frame)) => tokio::select! {
                _ = timer.tick() => {
                    let text = frame().map_err(|e| TransportError::WebSocket(e.to_string()))?;
                    send_text(ws, text).await?;
                    tracing::trace!(source = %source, "Keep-alive sent");
                    continue;
                }
                inbound = next_inbound(ws) => inbound?,
            },
            None => next_inbound(ws).await?,
        };

        match inbound {
            Inbound::Text(text) => {
                status.record_frame();
                let event = decode(&parse_frame(&text)?)?;
                route(source, store, event);
            }
            Inbound::CleanClose { code } => return Ok(StreamEnd::CleanClose { code }),
        }
    }
}

/// Publish the outcome of a decode loop and release the socket.
///
/// A clean close leaves the connector `Closed`; anything else marks it
/// `Failed` after a best-effort close frame.
///
/// # Errors
///
/// Returns the transport failure as a [`ConnectorError`].
pub async fn finish_stream(
    source: &str,
    status: &ConnectorStatus,
    mut ws: WsStream,
    outcome: Result<StreamEnd, TransportError>,
) -> Result<StreamEnd, ConnectorError> {
    match outcome {
        Ok(end) => {
            status.transition(ConnectorState::Closed);
            tracing::warn!(source = %source, end = ?end, "Stream closed by peer");
            Ok(end)
        }
        Err(error) => {
            status.fail(error.to_string());
            tracing::error!(source = %source, error = %error, "Stream failed");
            close_quietly(&mut ws).await;
            Err(error.into())
        }
    }
}
