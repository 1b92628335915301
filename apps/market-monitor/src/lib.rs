#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Monitor - Cross-Exchange Spread and Slippage Sampler
//!
//! Maintains one WebSocket session per exchange, keeps the latest top of
//! book and the trades seen since the last tick for every market, and on a
//! fixed cadence turns that state into spread and slippage metrics. Batches
//! from every exchange are aligned into lock-step rounds and stored.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market state and metric computation
//!   - `market`: Top of book, trade window, concurrent market store
//!   - `metrics`: Spread and slippage formulas
//!   - `sampling`: Source batches and synchronized rounds
//!   - `session`: Connector lifecycle state
//!   - `symbol`: Native to canonical symbol translation
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Exchange connector, record sink and observer interfaces
//!   - `services`: Sampling scheduler, round synchronizer, monitor pipeline
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchange`: Binance and KuCoin WebSocket connectors
//!   - `persistence`: Turso, log and in-memory sinks
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► decode ──► MarketStore ──► Scheduler ──┐
//!                                                       ├──► Synchronizer ──► Sink
//! KuCoin WS  ──► decode ──► MarketStore ──► Scheduler ──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market state and metric computation with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{MarketState, MarketStore, ResetPolicy, SnapshotMode, TopOfBook, TradeTick};
pub use domain::metrics::{CalcResult, SLIPPAGE_THRESHOLD_PCT};
pub use domain::sampling::{SourceBatch, SyncRound};
pub use domain::session::{ConnectorState, ConnectorStatus};
pub use domain::symbol::SymbolTranslation;

// Ports and services
pub use application::ports::{
    ConnectorError, ExchangeConnector, MonitorObserver, RecordSink, SetupError, SinkError,
    StoreReport, StreamEnd, TransportError,
};
pub use application::services::{
    Monitor, MonitorError, MonitorExit, RoundSynchronizer, SamplingScheduler, SchedulerConfig,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ExchangeKind, MonitorConfig, SinkKind};

// Exchange connectors
pub use infrastructure::exchange::{BinanceConfig, BinanceConnector, KucoinConfig, KucoinConnector};

// Sinks
pub use infrastructure::persistence::{InMemorySink, LogSink, StoredRecord, TursoSink};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusObserver, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
