//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, connector status reporting, and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (every connector streaming)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{MonitorObserver, StoreReport};
use crate::domain::sampling::SyncRound;
use crate::domain::session::{ConnectorState, ConnectorStatus};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Monitor version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Per-exchange connector status.
    pub connectors: Vec<ConnectorInfo>,
    /// Pipeline progress.
    pub pipeline: PipelineStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every connector streaming.
    Healthy,
    /// Some connectors streaming.
    Degraded,
    /// No connector streaming.
    Unhealthy,
}

/// Individual connector status.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorInfo {
    /// Exchange name.
    pub source: String,
    /// Lifecycle state.
    pub state: ConnectorState,
    /// Whether this connector is streaming.
    pub streaming: bool,
    /// Frames received count.
    pub frames_received: u64,
    /// Failure or close reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Pipeline progress counters.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Synchronized rounds assembled.
    pub rounds: u64,
    /// Records stored.
    pub records_stored: u64,
    /// Sink failures.
    pub sink_errors: u64,
    /// Time of the last assembled round.
    pub last_round_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
///
/// Registered as a [`MonitorObserver`] so it can follow round progress.
#[derive(Debug)]
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    connectors: Vec<Arc<ConnectorStatus>>,
    rounds: AtomicU64,
    records_stored: AtomicU64,
    sink_errors: AtomicU64,
    last_round_at: RwLock<Option<DateTime<Utc>>>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, connectors: Vec<Arc<ConnectorStatus>>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            connectors,
            rounds: AtomicU64::new(0),
            records_stored: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            last_round_at: RwLock::new(None),
        }
    }

    /// Current health snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HealthResponse {
        build_health_response(self)
    }

    /// Whether every connector is streaming.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.connectors.is_empty()
            && self
                .connectors
                .iter()
                .all(|c| c.state() == ConnectorState::Streaming)
    }
}

impl MonitorObserver for HealthServerState {
    fn on_round(&self, _round: &SyncRound) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        *self.last_round_at.write() = Some(Utc::now());
    }

    fn on_stored(&self, report: StoreReport) {
        self.records_stored
            .fetch_add(report.stored as u64, Ordering::Relaxed);
    }

    fn on_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");
        serve(listener, self.state, self.cancel).await
    }
}

/// Serve the health routes on an already bound listener.
///
/// # Errors
///
/// Returns `HealthServerError::ServerFailed` if the HTTP server fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
) -> Result<(), HealthServerError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

    tracing::info!("Health server stopped");
    Ok(())
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connectors: Vec<ConnectorInfo> = state.connectors.iter().map(|c| connector_info(c)).collect();

    HealthResponse {
        status: determine_health_status(&connectors),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        connectors,
        pipeline: PipelineStatus {
            rounds: state.rounds.load(Ordering::Relaxed),
            records_stored: state.records_stored.load(Ordering::Relaxed),
            sink_errors: state.sink_errors.load(Ordering::Relaxed),
            last_round_at: *state.last_round_at.read(),
        },
    }
}

fn connector_info(status: &ConnectorStatus) -> ConnectorInfo {
    let state = status.state();
    ConnectorInfo {
        source: status.source().to_string(),
        state,
        streaming: state == ConnectorState::Streaming,
        frames_received: status.frames_received(),
        last_error: status.last_error(),
    }
}

fn determine_health_status(connectors: &[ConnectorInfo]) -> HealthStatus {
    let streaming = connectors.iter().filter(|c| c.streaming).count();

    if streaming == 0 {
        HealthStatus::Unhealthy
    } else if streaming == connectors.len() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
