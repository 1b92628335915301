//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SamplingScheduler`: Per-connector timer that samples and resets markets
//! - `RoundSynchronizer`: Lock-step alignment of all schedulers
//! - `Monitor`: Pipeline wiring with scoped task lifetimes

mod monitor;
mod scheduler;
mod synchronizer;

pub use monitor::{Monitor, MonitorError, MonitorExit};
pub use scheduler::{DEFAULT_INTERVAL, SamplingScheduler, SchedulerConfig};
pub use synchronizer::RoundSynchronizer;
