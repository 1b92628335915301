//! KuCoin Connector
//!
//! Handshake streaming variant.
//!
//! # Connection Flow
//!
//! 1. `POST bullet-public` for a session token and server list
//! 2. Open `<endpoint>?token=<token>&connectId=<id>`
//! 3. Send the token frame, wait for `welcome`
//! 4. Subscribe to `/market/ticker:<markets>`, wait for `ack`
//! 5. Subscribe to `/market/match:<markets>`, wait for `ack`
//!
//! Every wait is bounded by the acknowledgement timeout. While streaming,
//! a `ping` frame is sent at the server's advertised `pingInterval`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::bootstrap::{BootstrapClient, DEFAULT_BOOTSTRAP_URL};
use super::codec::decode_kucoin;
use super::handshake::await_frame_of_type;
use super::messages::{
    KUCOIN_MATCH_TOPIC, KUCOIN_TICKER_TOPIC, PingRequest, SubscribeRequest, TokenRequest,
    kucoin_connect_url, kucoin_topic,
};
use super::session::{self, WsStream, close_quietly, send_text};
use super::stream::{KeepAlive, finish_stream, stream_frames};
use crate::application::ports::{
    ConnectorError, ExchangeConnector, SetupError, StreamEnd, TransportError,
};
use crate::domain::market::MarketStore;
use crate::domain::session::{ConnectorState, ConnectorStatus};

/// Source name.
pub const KUCOIN: &str = "kucoin";

/// Default acknowledgement timeout.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Keep-alive period used when the server advertises none.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(18);

/// KuCoin connector settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KucoinConfig {
    /// Bootstrap endpoint.
    pub bootstrap_url: String,
    /// Native markets, e.g. `BTC-USDT`.
    pub markets: Vec<String>,
    /// Bound on each handshake wait.
    pub ack_timeout: Duration,
}

impl KucoinConfig {
    /// Create settings for the production endpoint.
    #[must_use]
    pub fn new(markets: Vec<String>) -> Self {
        Self {
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            markets,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Override the bootstrap URL.
    #[must_use]
    pub fn with_bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Override the acknowledgement timeout.
    #[must_use]
    pub const fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

/// Short random id: the first 8 characters of a v4 UUID.
#[must_use]
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().to_string();
    id.truncate(8);
    id
}

fn ping_frame() -> Result<String, serde_json::Error> {
    serde_json::to_string(&PingRequest::new(short_id()))
}

fn encode<T: serde::Serialize>(frame: &T) -> Result<String, SetupError> {
    serde_json::to_string(frame).map_err(|e| SetupError::Encode(e.to_string()))
}

/// KuCoin public-stream connector.
pub struct KucoinConnector {
    config: KucoinConfig,
    connect_id: String,
    store: Arc<MarketStore>,
    status: Arc<ConnectorStatus>,
    ws: Option<WsStream>,
    ping_interval: Duration,
}

impl std::fmt::Debug for KucoinConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KucoinConnector")
            .field("config", &self.config)
            .field("connect_id", &self.connect_id)
            .field("state", &self.status.state())
            .field("connected", &self.ws.is_some())
            .finish_non_exhaustive()
    }
}

impl KucoinConnector {
    /// Create a connector.
    #[must_use]
    pub fn new(config: KucoinConfig) -> Self {
        let store = MarketStore::new(config.markets.iter().cloned());
        Self {
            config,
            connect_id: short_id(),
            store: Arc::new(store),
            status: Arc::new(ConnectorStatus::new(KUCOIN)),
            ws: None,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    /// Connection id sent in the connect URL.
    #[must_use]
    pub fn connect_id(&self) -> &str {
        &self.connect_id
    }

    /// Keep-alive period negotiated during the last bootstrap.
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    async fn establish(&mut self) -> Result<WsStream, SetupError> {
        let grant = BootstrapClient::new(self.config.bootstrap_url.as_str())?
            .request_grant()
            .await?;
        if grant.server.ping_interval > 0 {
            self.ping_interval = Duration::from_millis(grant.server.ping_interval);
        }

        let url = kucoin_connect_url(&grant.server.endpoint, &grant.token, &self.connect_id);
        tracing::info!(
            source = KUCOIN,
            endpoint = %grant.server.endpoint,
            connect_id = %self.connect_id,
            "Opening public stream"
        );
        let mut ws = session::open(&url).await?;

        match self.handshake(&mut ws, &grant.token).await {
            Ok(()) => Ok(ws),
            Err(error) => {
                close_quietly(&mut ws).await;
                Err(error)
            }
        }
    }

    async fn handshake(&self, ws: &mut WsStream, token: &str) -> Result<(), SetupError> {
        let timeout = self.config.ack_timeout;

        self.status.transition(ConnectorState::Authenticating);
        send(ws, encode(&TokenRequest::new(token))?).await?;
        await_frame_of_type(ws, "welcome", None, timeout).await?;
        tracing::debug!(source = KUCOIN, "Session authenticated");

        self.status.transition(ConnectorState::Subscribing);
        for channel in [KUCOIN_TICKER_TOPIC, KUCOIN_MATCH_TOPIC] {
            let request = SubscribeRequest::new(short_id(), kucoin_topic(channel, &self.config.markets));
            send(ws, encode(&request)?).await?;
            await_frame_of_type(ws, "ack", Some(&request.id), timeout).await?;
            tracing::debug!(source = KUCOIN, topic = %request.topic, "Subscribed");
        }

        Ok(())
    }
}

async fn send(ws: &mut WsStream, text: String) -> Result<(), SetupError> {
    send_text(ws, text)
        .await
        .map_err(|e| SetupError::Transport(e.to_string()))
}

#[async_trait]
impl ExchangeConnector for KucoinConnector {
    fn source(&self) -> &str {
        KUCOIN
    }

    fn store(&self) -> Arc<MarketStore> {
        Arc::clone(&self.store)
    }

    fn status(&self) -> Arc<ConnectorStatus> {
        Arc::clone(&self.status)
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.status.transition(ConnectorState::Connecting);

        match self.establish().await {
            Ok(ws) => {
                self.ws = Some(ws);
                self.status.transition(ConnectorState::Streaming);
                Ok(())
            }
            Err(error) => {
                self.status.fail(error.to_string());
                Err(error.into())
            }
        }
    }

    async fn decode_loop(&mut self) -> Result<StreamEnd, ConnectorError> {
        let Some(mut ws) = self.ws.take() else {
            return Err(TransportError::NotConnected.into());
        };

        let keepalive = KeepAlive {
            interval: self.ping_interval,
            frame: ping_frame,
        };
        let outcome = stream_frames(
            &mut ws,
            KUCOIN,
            &self.store,
            &self.status,
            decode_kucoin,
            Some(keepalive),
        )
        .await;

        finish_stream(KUCOIN, &self.status, ws, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_eight_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, short_id());
    }

    #[test]
    fn ping_frame_has_type() {
        let frame: serde_json::Value = serde_json::from_str(&ping_frame().unwrap()).unwrap();
        assert_eq!(frame["type"], "ping");
        assert_eq!(frame["id"].as_str().unwrap().len(), 8);
    }

    #[test]
    fn config_overrides() {
        let config = KucoinConfig::new(vec!["BTC-USDT".to_string()])
            .with_bootstrap_url("http://localhost/bullet")
            .with_ack_timeout(Duration::from_millis(250));

        assert_eq!(config.bootstrap_url, "http://localhost/bullet");
        assert_eq!(config.ack_timeout, Duration::from_millis(250));

        let connector = KucoinConnector::new(config);
        assert!(connector.store().contains("BTC-USDT"));
        assert_eq!(connector.ping_interval(), DEFAULT_PING_INTERVAL);
    }

    #[tokio::test]
    async fn unreachable_bootstrap_is_setup_failure() {
        let mut connector = KucoinConnector::new(
            KucoinConfig::new(vec!["BTC-USDT".to_string()])
                .with_bootstrap_url("http://127.0.0.1:9/bullet-public"),
        );

        let err = connector.connect().await.unwrap_err();
        assert!(err.is_setup());
        assert_eq!(connector.status().state(), ConnectorState::Failed);
    }
}
