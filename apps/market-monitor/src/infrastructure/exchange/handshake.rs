//! Handshake Acknowledgements
//!
//! The "wait for a message of the expected type, else time out" primitive
//! used while a connector authenticates and subscribes.
//!
//! Frames that do not match are discarded. Market state is never touched
//! here, and the timeout bounds the whole wait rather than each receive.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use super::session::{Inbound, WsStream, next_inbound};
use crate::application::ports::{SetupError, TransportError};

/// Wait for a frame whose `type` equals `expected`.
///
/// When `request_id` is given, a matching frame that carries an `id` must
/// carry that id; frames without an `id` still match.
///
/// # Errors
///
/// Returns [`SetupError::AckTimeout`] if no matching frame arrives in time,
/// [`SetupError::ClosedDuringHandshake`] if the peer closes, and
/// [`SetupError::Transport`] on socket errors.
pub async fn await_frame_of_type(
    ws: &mut WsStream,
    expected: &str,
    request_id: Option<&str>,
    timeout: Duration,
) -> Result<Value, SetupError> {
    let deadline = Instant::now() + timeout;
    let timed_out = || SetupError::AckTimeout {
        expected: expected.to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    };

    loop {
        let inbound = tokio::time::timeout_at(deadline, next_inbound(ws))
            .await
            .map_err(|_| timed_out())?;

        let text = match inbound {
            Ok(Inbound::Text(text)) => text,
            Ok(Inbound::CleanClose { .. })
            | Err(TransportError::UnexpectedClose { .. } | TransportError::StreamEnded) => {
                return Err(SetupError::ClosedDuringHandshake);
            }
            Err(e) => return Err(SetupError::Transport(e.to_string())),
        };

        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            tracing::trace!(expected, "Discarding non-JSON frame during handshake");
            continue;
        };

        if matches_ack(&frame, expected, request_id) {
            tracing::debug!(expected, "Handshake acknowledgement received");
            return Ok(frame);
        }

        tracing::trace!(expected, "Discarding frame during handshake");
    }
}

/// Whether a frame acknowledges the expected type and request.
#[must_use]
pub fn matches_ack(frame: &Value, expected: &str, request_id: Option<&str>) -> bool {
    if frame.get("type").and_then(Value::as_str) != Some(expected) {
        return false;
    }

    match (request_id, frame.get("id").and_then(Value::as_str)) {
        (Some(want), Some(got)) => want == got,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn matches_type() {
        assert!(matches_ack(&json!({"type": "welcome", "id": "c1"}), "welcome", None));
        assert!(!matches_ack(&json!({"type": "message"}), "welcome", None));
        assert!(!matches_ack(&json!({"id": "c1"}), "welcome", None));
    }

    #[test]
    fn matches_request_id_when_present() {
        let ack = json!({"type": "ack", "id": "sub-1"});
        assert!(matches_ack(&ack, "ack", Some("sub-1")));
        assert!(!matches_ack(&ack, "ack", Some("sub-2")));
        assert!(matches_ack(&json!({"type": "ack"}), "ack", Some("sub-2")));
    }
}
