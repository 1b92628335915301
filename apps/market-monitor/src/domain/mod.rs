//! Domain Layer - Market state and metric computation.
//!
//! Pure types and functions with no I/O. Everything here is usable from a
//! unit test without a runtime.

/// Per-market top of book and trade window.
pub mod market;

/// Spread and slippage computation.
pub mod metrics;

/// Scheduler batches and synchronized rounds.
pub mod sampling;

/// Connector lifecycle state.
pub mod session;

/// Native to canonical symbol translation.
pub mod symbol;
