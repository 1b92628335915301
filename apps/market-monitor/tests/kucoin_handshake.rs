//! KuCoin Handshake Integration Tests
//!
//! Bootstrap is served by wiremock, the public stream by a local WebSocket
//! server that scripts the welcome and subscription acknowledgements.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_monitor::{
    ConnectorError, ConnectorState, ExchangeConnector, KucoinConfig, KucoinConnector, SetupError,
    StreamEnd, TransportError,
};

type ServerWs = WebSocketStream<TcpStream>;

/// How the scripted server answers the handshake.
#[derive(Clone, Copy)]
enum Script {
    /// Welcome, ack both subscriptions, play market frames, close.
    Full,
    /// Read the token and never answer.
    Silent,
    /// Welcome the client, then never acknowledge its subscription.
    Unacked,
    /// Full handshake, then ping the client until both its pong and its
    /// own keep-alive arrive.
    Heartbeat,
}

async fn recv_json(ws: &mut ServerWs) -> Option<Value> {
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).ok();
        }
    }
    None
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

async fn stream_server(script: Script) -> (SocketAddr, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut requests = Vec::new();

        let token = recv_json(&mut ws).await.unwrap();
        requests.push(token);

        if let Script::Unacked = script {
            send_json(&mut ws, json!({"id": "welcome-1", "type": "welcome"})).await;
            let subscribe = recv_json(&mut ws).await.unwrap();
            requests.push(subscribe);
        }

        if matches!(script, Script::Full | Script::Heartbeat) {
            send_json(&mut ws, json!({"id": "welcome-1", "type": "welcome"})).await;

            for _ in 0..2 {
                let subscribe = recv_json(&mut ws).await.unwrap();
                let id = subscribe["id"].as_str().unwrap().to_string();
                // Unrelated frames before the ack are discarded by the client.
                send_json(&mut ws, json!({"id": "other", "type": "ack"})).await;
                send_json(&mut ws, json!({"id": id, "type": "ack"})).await;
                requests.push(subscribe);
            }
        }

        if let Script::Heartbeat = script {
            let (mut pong, mut keepalive) = (false, false);
            while !(pong && keepalive) {
                ws.send(Message::Ping("hb".into())).await.unwrap();
                match ws.next().await {
                    Some(Ok(Message::Pong(data))) if data.as_ref() == b"hb" => pong = true,
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                        if frame["type"] == "ping" {
                            keepalive = true;
                            requests.push(frame);
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
            let _ = ws.close(None).await;
        }

        if let Script::Full = script {
            send_json(
                &mut ws,
                json!({
                    "type": "message",
                    "topic": "/market/ticker:BTC-USDT",
                    "subject": "trade.ticker",
                    "data": {"bestAsk": "101.0", "bestBid": "100.0"}
                }),
            )
            .await;
            send_json(
                &mut ws,
                json!({
                    "type": "message",
                    "topic": "/market/match:BTC-USDT",
                    "data": {"price": "100.5", "side": "buy"}
                }),
            )
            .await;
            send_json(
                &mut ws,
                json!({
                    "type": "message",
                    "topic": "/market/match:BTC-USDT",
                    "data": {"price": "99.0", "side": "sell"}
                }),
            )
            .await;
            let _ = ws.close(None).await;
        }

        while let Some(Ok(_)) = ws.next().await {}
        requests
    });

    (addr, handle)
}

async fn bootstrap(ws_addr: SocketAddr) -> MockServer {
    bootstrap_with_ping(ws_addr, 18_000).await
}

async fn bootstrap_with_ping(ws_addr: SocketAddr, ping_interval_ms: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bullet-public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "200000",
            "data": {
                "token": "test-token",
                "instanceServers": [{
                    "endpoint": format!("ws://{ws_addr}/"),
                    "protocol": "websocket",
                    "encrypt": false,
                    "pingInterval": ping_interval_ms,
                    "pingTimeout": 10000
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn connector(bootstrap: &MockServer) -> KucoinConnector {
    KucoinConnector::new(
        KucoinConfig::new(vec!["BTC-USDT".to_string(), "ETH-USDT".to_string()])
            .with_bootstrap_url(format!("{}/api/v1/bullet-public", bootstrap.uri()))
            .with_ack_timeout(Duration::from_millis(500)),
    )
}

#[tokio::test]
async fn handshake_then_stream_buy_side_trades() {
    let (ws_addr, ws_server) = stream_server(Script::Full).await;
    let bootstrap = bootstrap(ws_addr).await;
    let mut connector = connector(&bootstrap);

    connector.connect().await.unwrap();
    assert_eq!(connector.status().state(), ConnectorState::Streaming);
    assert_eq!(connector.ping_interval(), Duration::from_secs(18));

    let end = connector.decode_loop().await.unwrap();
    assert_eq!(end, StreamEnd::CleanClose { code: None });
    assert_eq!(connector.status().state(), ConnectorState::Closed);

    let state = connector.store().snapshot("BTC-USDT").unwrap();
    assert!(state.top_of_book().is_some());
    assert_eq!(state.trades().len(), 1);
    assert!((state.trades()[0].price - 100.5).abs() < f64::EPSILON);

    let requests = ws_server.await.unwrap();
    assert_eq!(requests[0]["type"], "token");
    assert_eq!(requests[0]["token"], "test-token");
    assert_eq!(requests[1]["type"], "subscribe");
    assert_eq!(requests[1]["topic"], "/market/ticker:BTC-USDT,ETH-USDT");
    assert_eq!(requests[1]["privateChannel"], false);
    assert_eq!(requests[1]["response"], true);
    assert_eq!(requests[2]["topic"], "/market/match:BTC-USDT,ETH-USDT");
    assert_ne!(requests[1]["id"], requests[2]["id"]);
}

#[tokio::test]
async fn keepalive_and_pong_interleave_without_loss() {
    let (ws_addr, ws_server) = stream_server(Script::Heartbeat).await;
    let bootstrap = bootstrap_with_ping(ws_addr, 20).await;
    let mut connector = connector(&bootstrap);

    connector.connect().await.unwrap();
    assert_eq!(connector.ping_interval(), Duration::from_millis(20));

    let end = tokio::time::timeout(Duration::from_secs(5), connector.decode_loop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(end, StreamEnd::CleanClose { code: None });

    let requests = ws_server.await.unwrap();
    assert_eq!(requests.last().unwrap()["type"], "ping");
}

#[tokio::test]
async fn missing_welcome_times_out() {
    let (ws_addr, ws_server) = stream_server(Script::Silent).await;
    let bootstrap = bootstrap(ws_addr).await;
    let mut connector = connector(&bootstrap);

    let err = connector.connect().await.unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::Setup(SetupError::AckTimeout { ref expected, timeout_ms: 500 }) if expected == "welcome"
    ));
    assert_eq!(connector.status().state(), ConnectorState::Failed);
    assert!(connector.decode_loop().await.is_err());

    let requests = ws_server.await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn missing_subscription_ack_times_out() {
    let (ws_addr, ws_server) = stream_server(Script::Unacked).await;
    let bootstrap = bootstrap(ws_addr).await;
    let mut connector = connector(&bootstrap);

    let err = connector.connect().await.unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::Setup(SetupError::AckTimeout { ref expected, timeout_ms: 500 }) if expected == "ack"
    ));
    assert_eq!(connector.status().state(), ConnectorState::Failed);
    assert_eq!(
        connector.decode_loop().await.unwrap_err(),
        ConnectorError::Transport(TransportError::NotConnected)
    );

    let requests = ws_server.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["topic"], "/market/ticker:BTC-USDT,ETH-USDT");
}

#[tokio::test]
async fn bootstrap_without_servers_is_setup_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bullet-public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "200000",
            "data": {"token": "test-token", "instanceServers": []}
        })))
        .mount(&server)
        .await;
    let mut connector = connector(&server);

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err, ConnectorError::Setup(SetupError::NoInstanceServer));
}

#[tokio::test]
async fn bootstrap_http_error_is_setup_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let mut connector = connector(&server);

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err, ConnectorError::Setup(SetupError::BootstrapStatus(503)));
}
