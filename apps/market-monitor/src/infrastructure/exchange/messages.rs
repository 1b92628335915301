//! Exchange Wire Messages
//!
//! Outbound request frames, the KuCoin bootstrap response, and the URL and
//! topic builders for both exchanges.
//!
//! # Binance Combined Streams
//!
//! ```text
//! wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/btcusdt@trade
//! {"stream":"btcusdt@ticker","data":{"a":"100.1","b":"100.0",...}}
//! {"stream":"btcusdt@trade","data":{"p":"100.05",...}}
//! ```
//!
//! # KuCoin Public Streams
//!
//! ```text
//! POST /api/v1/bullet-public → {"code":"200000","data":{"token":"..","instanceServers":[..]}}
//! → {"id":"auth","type":"token","token":".."}           ← {"type":"welcome"}
//! → {"id":"..","type":"subscribe","topic":"/market/ticker:BTC-USDT",..} ← {"type":"ack"}
//! ```

use serde::{Deserialize, Serialize};

/// KuCoin ticker channel prefix.
pub const KUCOIN_TICKER_TOPIC: &str = "/market/ticker";

/// KuCoin match (trade) channel prefix.
pub const KUCOIN_MATCH_TOPIC: &str = "/market/match";

/// KuCoin bootstrap success code.
pub const KUCOIN_SUCCESS_CODE: &str = "200000";

// =============================================================================
// Outbound Frames
// =============================================================================

/// KuCoin authentication frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    /// Request id.
    pub id: String,
    /// Always `token`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Bootstrap session token.
    pub token: String,
}

impl TokenRequest {
    /// Create the auth frame for a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            id: "auth".to_string(),
            kind: "token",
            token: token.into(),
        }
    }
}

/// KuCoin subscribe frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Request id echoed by the ack.
    pub id: String,
    /// Always `subscribe`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Topic with comma-separated markets.
    pub topic: String,
    /// Public channel.
    pub private_channel: bool,
    /// Ask the server to acknowledge.
    pub response: bool,
}

impl SubscribeRequest {
    /// Create a public, acknowledged subscription.
    #[must_use]
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "subscribe",
            topic: topic.into(),
            private_channel: false,
            response: true,
        }
    }
}

/// KuCoin application-level keep-alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingRequest {
    /// Request id.
    pub id: String,
    /// Always `ping`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl PingRequest {
    /// Create a ping frame.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "ping",
        }
    }
}

// =============================================================================
// Bootstrap Response
// =============================================================================

/// `bullet-public` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct BulletResponse {
    /// Exchange status code, `200000` on success.
    #[serde(default)]
    pub code: String,
    /// Session data.
    #[serde(default)]
    pub data: Option<BulletData>,
}

/// Session token and servers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletData {
    /// Short-lived session token.
    #[serde(default)]
    pub token: String,
    /// Candidate WebSocket servers.
    #[serde(default)]
    pub instance_servers: Vec<InstanceServer>,
}

/// One WebSocket server advertised by the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceServer {
    /// WebSocket endpoint.
    pub endpoint: String,
    /// Keep-alive interval in milliseconds.
    #[serde(default)]
    pub ping_interval: u64,
    /// Server-side ping timeout in milliseconds.
    #[serde(default)]
    pub ping_timeout: u64,
}

// =============================================================================
// URL and Topic Builders
// =============================================================================

/// Combined-stream URL subscribing to ticker and trade for every market.
#[must_use]
pub fn binance_stream_url<S: AsRef<str>>(base: &str, markets: &[S]) -> String {
    let streams = markets
        .iter()
        .flat_map(|market| {
            let market = market.as_ref().to_lowercase();
            [format!("{market}@ticker"), format!("{market}@trade")]
        })
        .collect::<Vec<_>>()
        .join("/");

    format!("{base}?streams={streams}")
}

/// KuCoin topic for a channel and a set of markets.
#[must_use]
pub fn kucoin_topic<S: AsRef<str>>(channel: &str, markets: &[S]) -> String {
    let markets = markets
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",");
    format!("{channel}:{markets}")
}

/// KuCoin connect URL for a server, token and connection id.
#[must_use]
pub fn kucoin_connect_url(endpoint: &str, token: &str, connect_id: &str) -> String {
    format!("{endpoint}?token={token}&connectId={connect_id}")
}
