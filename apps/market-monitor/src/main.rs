//! Market Monitor Binary
//!
//! Starts the cross-exchange spread and slippage monitor.
//!
//! # Usage
//!
//! ```bash
//! MONITOR_MARKETS=BTC/USDT,ETH/USDT cargo run --bin market-monitor
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `MONITOR_MARKETS`: Canonical markets, comma separated (e.g. `BTC/USDT`)
//!
//! ## Optional
//! - `MONITOR_EXCHANGES`: Exchanges in round order (default: binance,kucoin)
//! - `MONITOR_INTERVAL_SECS`: Sampling interval in seconds (default: 5)
//! - `MONITOR_ACK_TIMEOUT_MS`: Handshake acknowledgement timeout (default: 1000)
//! - `MONITOR_CLEAR_TOP_OF_BOOK`: Clear top of book after each tick (default: true)
//! - `MONITOR_SNAPSHOT_MODE`: live | barrier (default: live)
//! - `MONITOR_SINK`: turso | log (default: turso)
//! - `MONITOR_DB_PATH`: Database file (default: ./data/market_metrics.db)
//! - `MONITOR_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `BINANCE_STREAM_URL`: Binance combined-stream base URL
//! - `KUCOIN_BOOTSTRAP_URL`: KuCoin public token endpoint
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log level (default: `market_monitor=info`)

use std::sync::Arc;

use market_monitor::application::ports::{ExchangeConnector, MonitorObserver, RecordSink};
use market_monitor::infrastructure::health::{HealthServer, HealthServerState};
use market_monitor::infrastructure::telemetry;
use market_monitor::{
    BinanceConfig, BinanceConnector, ExchangeKind, KucoinConfig, KucoinConnector, LogSink,
    Monitor, MonitorConfig, MonitorExit, PrometheusObserver, SinkKind, TursoSink, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Market Monitor");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
    }

    let config = MonitorConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let sink = build_sink(&config).await?;

    let mut monitor = Monitor::new(config.sampling.scheduler(), sink);
    for exchange in &config.exchanges {
        monitor.add_connector(build_connector(&config, *exchange));
    }

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        monitor.statuses(),
    ));
    let health_observer: Arc<dyn MonitorObserver> = health_state.clone();
    let monitor = monitor
        .with_observer(Arc::new(PrometheusObserver))
        .with_observer(health_observer);

    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_server = HealthServer::new(
            config.server.health_port,
            Arc::clone(&health_state),
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let result = monitor.run(shutdown_token.clone()).await;
    shutdown_token.cancel();

    match result {
        Ok(MonitorExit::Cancelled) => tracing::info!("Market monitor stopped"),
        Ok(MonitorExit::SourcesEnded) => tracing::warn!("All sources ended, market monitor stopped"),
        Err(e) => {
            tracing::error!(error = %e, "Market monitor failed");
            return Err(e.into());
        }
    }

    Ok(())
}

fn build_connector(
    config: &MonitorConfig,
    exchange: ExchangeKind,
) -> Box<dyn ExchangeConnector> {
    let markets = config.native_markets(exchange);
    match exchange {
        ExchangeKind::Binance => Box::new(BinanceConnector::new(
            BinanceConfig::new(markets).with_base_url(config.endpoints.binance_stream_url.clone()),
        )),
        ExchangeKind::Kucoin => Box::new(KucoinConnector::new(
            KucoinConfig::new(markets)
                .with_bootstrap_url(config.endpoints.kucoin_bootstrap_url.clone())
                .with_ack_timeout(config.endpoints.ack_timeout),
        )),
    }
}

async fn build_sink(
    config: &MonitorConfig,
) -> Result<Arc<dyn RecordSink>, Box<dyn std::error::Error>> {
    let translation = config.translation();
    match config.sink.kind {
        SinkKind::Turso => {
            let sink = TursoSink::open(&config.sink.db_path, translation)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to open database"))?;
            Ok(Arc::new(sink))
        }
        SinkKind::Log => Ok(Arc::new(LogSink::new(translation))),
    }
}

fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

fn log_config(config: &MonitorConfig) {
    tracing::info!(
        markets = ?config.markets,
        exchanges = ?config.exchanges.iter().map(ExchangeKind::as_str).collect::<Vec<_>>(),
        interval_ms = config.sampling.interval.as_millis(),
        snapshot_mode = config.sampling.snapshot_mode.as_str(),
        clear_top_of_book = config.sampling.clear_top_of_book,
        sink = config.sink.kind.as_str(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        binance_stream_url = %config.endpoints.binance_stream_url,
        kucoin_bootstrap_url = %config.endpoints.kucoin_bootstrap_url,
        db_path = %config.sink.db_path.display(),
        "Endpoints"
    );
}

fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
