//! WebSocket Session
//!
//! Transport helpers shared by all exchange connectors: opening the socket,
//! reading the next text frame while answering pings, classifying close
//! frames, and a best-effort close on the way out.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{SetupError, TransportError};

/// Client WebSocket over plain TCP or TLS.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the closing handshake on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Open a WebSocket to `url`.
///
/// # Errors
///
/// Returns [`SetupError::Open`] if the connection or upgrade fails.
pub async fn open(url: &str) -> Result<WsStream, SetupError> {
    let (ws, response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| SetupError::Open(e.to_string()))?;

    tracing::debug!(status = %response.status(), "WebSocket upgraded");
    Ok(ws)
}

/// Next application-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text payload (binary frames are decoded as UTF-8).
    Text(String),
    /// Peer closed with a normal or going-away code.
    CleanClose {
        /// Close code, if the peer sent one.
        code: Option<u16>,
    },
}

/// Whether a close frame ends the session cleanly.
///
/// A close without a frame counts as clean.
///
/// # Errors
///
/// Returns [`TransportError::UnexpectedClose`] for any other code.
pub fn classify_close(frame: Option<&CloseFrame>) -> Result<Option<u16>, TransportError> {
    let Some(frame) = frame else {
        return Ok(None);
    };

    match frame.code {
        CloseCode::Normal | CloseCode::Away => Ok(Some(u16::from(frame.code))),
        code => Err(TransportError::UnexpectedClose {
            code: u16::from(code),
            reason: frame.reason.as_str().to_string(),
        }),
    }
}

/// Read until a text frame or a close arrives, answering pings on the way.
///
/// # Errors
///
/// Returns a [`TransportError`] on socket errors, undecodable binary frames,
/// unexpected close codes, or if the stream ends without a close frame.
pub async fn next_inbound(ws: &mut WsStream) -> Result<Inbound, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Inbound::Text(text.as_str().to_owned())),
            Some(Ok(Message::Binary(data))) => {
                let text = String::from_utf8(data.to_vec()).map_err(|_| {
                    TransportError::MalformedFrame("binary frame is not UTF-8".to_string())
                })?;
                return Ok(Inbound::Text(text));
            }
            Some(Ok(Message::Ping(data))) => {
                ws.send(Message::Pong(data)).await?;
            }
            Some(Ok(Message::Close(frame))) => {
                let code = classify_close(frame.as_ref())?;
                return Ok(Inbound::CleanClose { code });
            }
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(TransportError::StreamEnded),
        }
    }
}

/// Send a text frame.
///
/// # Errors
///
/// Returns a [`TransportError`] if the socket rejects the frame.
pub async fn send_text(ws: &mut WsStream, text: String) -> Result<(), TransportError> {
    ws.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Attempt a closing handshake, ignoring failures.
pub async fn close_quietly(ws: &mut WsStream) {
    match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
        Ok(Ok(())) => tracing::debug!("WebSocket closed"),
        Ok(Err(e)) => tracing::debug!(error = %e, "WebSocket close failed"),
        Err(_) => tracing::debug!("WebSocket close timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(code: CloseCode) -> CloseFrame {
        CloseFrame {
            code,
            reason: "bye".into(),
        }
    }

    #[test]
    fn close_without_frame_is_clean() {
        assert_eq!(classify_close(None), Ok(None));
    }

    #[test]
    fn normal_and_away_are_clean() {
        assert_eq!(classify_close(Some(&frame(CloseCode::Normal))), Ok(Some(1000)));
        assert_eq!(classify_close(Some(&frame(CloseCode::Away))), Ok(Some(1001)));
    }

    #[test]
    fn other_codes_are_unexpected() {
        let err = classify_close(Some(&frame(CloseCode::Error))).unwrap_err();
        assert_eq!(
            err,
            TransportError::UnexpectedClose {
                code: 1011,
                reason: "bye".to_string(),
            }
        );
    }
}
