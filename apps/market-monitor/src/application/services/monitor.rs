//! Monitor Pipeline
//!
//! Wires connectors, schedulers, the round synchronizer and the sink into
//! one running pipeline.
//!
//! # Lifecycle
//!
//! 1. Connect every connector in registration order. The first setup failure
//!    aborts start-up and drops every connector, releasing open transports.
//! 2. Spawn each decode loop and scheduler into a `JoinSet`.
//! 3. Hand every synchronized round to the sink while watching for
//!    cancellation and decode-loop completion.
//! 4. Shut the `JoinSet` down on every exit path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    ConnectorError, ExchangeConnector, MonitorObserver, RecordSink, StoreReport, StreamEnd,
};
use crate::application::services::scheduler::{SamplingScheduler, SchedulerConfig};
use crate::application::services::synchronizer::RoundSynchronizer;
use crate::domain::sampling::SyncRound;
use crate::domain::session::{ConnectorState, ConnectorStatus};

/// Monitor failure.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Nothing to monitor.
    #[error("no exchange connectors registered")]
    NoConnectors,

    /// A connector could not reach `Streaming`.
    #[error("{exchange} failed to connect: {error}")]
    Setup {
        /// Exchange name.
        exchange: String,
        /// Underlying failure.
        error: ConnectorError,
    },

    /// A decode loop failed while streaming.
    #[error("{exchange} stream failed: {error}")]
    Stream {
        /// Exchange name.
        exchange: String,
        /// Underlying failure.
        error: ConnectorError,
    },

    /// A pipeline task panicked.
    #[error("pipeline task failed: {0}")]
    Task(String),
}

/// How a monitor run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Shutdown was requested.
    Cancelled,
    /// A scheduler stopped, so no further rounds can complete.
    SourcesEnded,
}

/// Fans events out to every registered observer.
#[derive(Clone, Default)]
struct Observers(Vec<Arc<dyn MonitorObserver>>);

impl MonitorObserver for Observers {
    fn on_state(&self, source: &str, state: ConnectorState) {
        self.0.iter().for_each(|o| o.on_state(source, state));
    }

    fn on_round(&self, round: &SyncRound) {
        self.0.iter().for_each(|o| o.on_round(round));
    }

    fn on_stored(&self, report: StoreReport) {
        self.0.iter().for_each(|o| o.on_stored(report));
    }

    fn on_sink_error(&self) {
        self.0.iter().for_each(|o| o.on_sink_error());
    }

    fn on_stream_end(&self, source: &str, end: StreamEnd) {
        self.0.iter().for_each(|o| o.on_stream_end(source, end));
    }
}

enum TaskOutcome {
    Decode {
        exchange: String,
        state: ConnectorState,
        result: Result<StreamEnd, ConnectorError>,
    },
    Scheduler,
}

/// Multi-exchange sampling pipeline.
pub struct Monitor {
    scheduler: SchedulerConfig,
    sink: Arc<dyn RecordSink>,
    connectors: Vec<Box<dyn ExchangeConnector>>,
    observers: Observers,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("scheduler", &self.scheduler)
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.source()).collect::<Vec<_>>(),
            )
            .field("observers", &self.observers.0.len())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor that stores rounds in `sink`.
    #[must_use]
    pub fn new(scheduler: SchedulerConfig, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            scheduler,
            sink,
            connectors: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Register an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MonitorObserver>) -> Self {
        self.observers.0.push(observer);
        self
    }

    /// Register a connector. Registration order is round batch order.
    pub fn add_connector(&mut self, connector: Box<dyn ExchangeConnector>) {
        self.connectors.push(connector);
    }

    /// Status cells of every registered connector.
    #[must_use]
    pub fn statuses(&self) -> Vec<Arc<ConnectorStatus>> {
        self.connectors.iter().map(|c| c.status()).collect()
    }

    /// Sampling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.scheduler.interval
    }

    /// Run the pipeline until cancelled or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Setup`] if a connector fails to connect and
    /// [`MonitorError::Stream`] if a decode loop fails while streaming.
    pub async fn run(self, cancel: CancellationToken) -> Result<MonitorExit, MonitorError> {
        let Self {
            scheduler,
            sink,
            mut connectors,
            observers,
        } = self;

        if connectors.is_empty() {
            return Err(MonitorError::NoConnectors);
        }

        for connector in &mut connectors {
            let exchange = connector.source().to_string();
            tracing::info!(source = %exchange, "Connecting to exchange");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(MonitorExit::Cancelled),
                result = connector.connect() => result,
            };
            observers.on_state(&exchange, connector.status().state());

            if let Err(error) = result {
                tracing::error!(source = %exchange, error = %error, "Exchange setup failed");
                return Err(MonitorError::Setup { exchange, error });
            }
            tracing::info!(
                source = %exchange,
                markets = connector.store().len(),
                "Exchange streaming"
            );
        }

        // Independent of `cancel` so shutdown cannot surface as closed channels.
        let scheduler_cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut receivers = Vec::with_capacity(connectors.len());

        for mut connector in connectors {
            let exchange = connector.source().to_string();
            let (tx, rx) = mpsc::unbounded_channel();
            receivers.push(rx);

            let sampler = SamplingScheduler::new(exchange.as_str(), connector.store(), scheduler);
            let token = scheduler_cancel.clone();
            tasks.spawn(async move {
                sampler.run(tx, token).await;
                TaskOutcome::Scheduler
            });

            let span = tracing::info_span!("connector", source = %exchange);
            tasks.spawn(
                async move {
                    let result = connector.decode_loop().await;
                    let state = connector.status().state();
                    TaskOutcome::Decode {
                        exchange,
                        state,
                        result,
                    }
                }
                .instrument(span),
            );
        }

        let mut synchronizer = RoundSynchronizer::new(receivers);
        tracing::info!(
            sources = synchronizer.sources(),
            interval_ms = scheduler.interval.as_millis(),
            "Monitor pipeline running"
        );

        let exit = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break Ok(MonitorExit::Cancelled),

                Some(joined) = tasks.join_next() => match joined {
                    Ok(TaskOutcome::Decode { exchange, state, result }) => {
                        observers.on_state(&exchange, state);
                        match result {
                            Ok(end) => {
                                tracing::warn!(
                                    source = %exchange,
                                    end = ?end,
                                    "Exchange closed the stream, sampling continues on frozen state"
                                );
                                observers.on_stream_end(&exchange, end);
                            }
                            Err(error) => {
                                tracing::error!(source = %exchange, error = %error, "Exchange stream failed");
                                break Err(MonitorError::Stream { exchange, error });
                            }
                        }
                    }
                    Ok(TaskOutcome::Scheduler) => {}
                    Err(join_error) => break Err(MonitorError::Task(join_error.to_string())),
                },

                round = synchronizer.next_round() => {
                    let Some(round) = round else {
                        break Ok(MonitorExit::SourcesEnded);
                    };
                    observers.on_round(&round);
                    store_round(sink.as_ref(), &observers, &round).await;
                }
            }
        };

        scheduler_cancel.cancel();
        tasks.shutdown().await;
        tracing::info!(rounds = synchronizer.rounds(), "Monitor pipeline stopped");
        exit
    }
}

async fn store_round(sink: &dyn RecordSink, observers: &Observers, round: &SyncRound) {
    match sink.store_round(round).await {
        Ok(report) => {
            if report.rejected > 0 {
                tracing::warn!(
                    round = round.round,
                    rejected = report.rejected,
                    "Records rejected by sink"
                );
            }
            tracing::debug!(round = round.round, stored = report.stored, "Round stored");
            observers.on_stored(report);
        }
        Err(error) => {
            tracing::error!(round = round.round, error = %error, "Failed to store round");
            observers.on_sink_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::SinkError;

    struct NullSink;

    #[async_trait]
    impl RecordSink for NullSink {
        async fn store_round(&self, _round: &SyncRound) -> Result<StoreReport, SinkError> {
            Ok(StoreReport::default())
        }
    }

    #[tokio::test]
    async fn run_without_connectors_fails() {
        let monitor = Monitor::new(SchedulerConfig::default(), Arc::new(NullSink));
        let result = monitor.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(MonitorError::NoConnectors)));
    }

    #[test]
    fn debug_lists_connectors() {
        let monitor = Monitor::new(SchedulerConfig::default(), Arc::new(NullSink));
        assert!(format!("{monitor:?}").contains("connectors"));
        assert_eq!(monitor.interval(), Duration::from_secs(5));
    }
}
