//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `ExchangeConnector`: one streaming session to an exchange
//! - `RecordSink`: storage for synchronized rounds
//! - `MonitorObserver`: pipeline events for metrics and health

mod exchange_connector_port;
mod monitor_observer_port;
mod record_sink_port;

pub use exchange_connector_port::{
    ConnectorError, ExchangeConnector, SetupError, StreamEnd, TransportError,
};
pub use monitor_observer_port::{MonitorObserver, NoOpObserver};
pub use record_sink_port::{RecordSink, SinkError, StoreReport};
