//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the sampling pipeline services and the port
//! interfaces that exchange and persistence adapters implement.

/// Port interfaces for exchanges, sinks and observers.
pub mod ports;

/// Sampling scheduler, round synchronizer and monitor pipeline.
pub mod services;
