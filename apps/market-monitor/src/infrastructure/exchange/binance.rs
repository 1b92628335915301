//! Binance Connector
//!
//! Simple streaming variant: subscriptions are expressed in the combined
//! stream URL, so connecting is just opening the socket. No authentication
//! or acknowledgement is involved and trades carry no side filter.

use std::sync::Arc;

use async_trait::async_trait;

use super::codec::decode_binance;
use super::messages::binance_stream_url;
use super::session::{self, WsStream};
use super::stream::{finish_stream, stream_frames};
use crate::application::ports::{ConnectorError, ExchangeConnector, StreamEnd, TransportError};
use crate::domain::market::MarketStore;
use crate::domain::session::{ConnectorState, ConnectorStatus};

/// Source name.
pub const BINANCE: &str = "binance";

/// Default combined-stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/stream";

/// Binance connector settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceConfig {
    /// Combined-stream base URL.
    pub base_url: String,
    /// Native markets, e.g. `btcusdt`.
    pub markets: Vec<String>,
}

impl BinanceConfig {
    /// Create settings for the production endpoint.
    #[must_use]
    pub fn new(markets: Vec<String>) -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_string(),
            markets,
        }
    }

    /// Override the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Binance combined-stream connector.
pub struct BinanceConnector {
    config: BinanceConfig,
    store: Arc<MarketStore>,
    status: Arc<ConnectorStatus>,
    ws: Option<WsStream>,
}

impl std::fmt::Debug for BinanceConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceConnector")
            .field("config", &self.config)
            .field("state", &self.status.state())
            .field("connected", &self.ws.is_some())
            .finish_non_exhaustive()
    }
}

impl BinanceConnector {
    /// Create a connector; market keys are lower-cased.
    #[must_use]
    pub fn new(config: BinanceConfig) -> Self {
        let store = MarketStore::new(config.markets.iter().map(|m| m.to_lowercase()));
        Self {
            config,
            store: Arc::new(store),
            status: Arc::new(ConnectorStatus::new(BINANCE)),
            ws: None,
        }
    }

    /// URL subscribing to every market's ticker and trade streams.
    #[must_use]
    pub fn stream_url(&self) -> String {
        let markets: Vec<&str> = self.store.markets().collect();
        binance_stream_url(&self.config.base_url, &markets)
    }
}

#[async_trait]
impl ExchangeConnector for BinanceConnector {
    fn source(&self) -> &str {
        BINANCE
    }

    fn store(&self) -> Arc<MarketStore> {
        Arc::clone(&self.store)
    }

    fn status(&self) -> Arc<ConnectorStatus> {
        Arc::clone(&self.status)
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.status.transition(ConnectorState::Connecting);
        let url = self.stream_url();
        tracing::info!(source = BINANCE, url = %url, "Opening combined stream");

        match session::open(&url).await {
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

        let outcome = stream_frames(
            &mut ws,
            BINANCE,
            &self.store,
            &self.status,
            decode_binance,
            None,
        )
        .await;

        finish_stream(BINANCE, &self.status, ws, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_are_lowercased() {
        let connector = BinanceConnector::new(BinanceConfig::new(vec![
            "BTCUSDT".to_string(),
            "ethusdt".to_string(),
        ]));

        assert!(connector.store().contains("btcusdt"));
        assert!(connector.store().contains("ethusdt"));
        assert_eq!(
            connector.stream_url(),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/btcusdt@trade/ethusdt@ticker/ethusdt@trade"
        );
    }

    #[tokio::test]
    async fn decode_before_connect_fails() {
        let mut connector = BinanceConnector::new(BinanceConfig::new(vec!["btcusdt".to_string()]));
        let err = connector.decode_loop().await.unwrap_err();
        assert_eq!(err, ConnectorError::Transport(TransportError::NotConnected));
        assert_eq!(connector.status().state(), ConnectorState::Disconnected);
    }
}
