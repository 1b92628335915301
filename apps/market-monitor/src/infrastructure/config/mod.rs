//! Configuration Module
//!
//! Configuration loading for the market monitor.

mod settings;

pub use settings::{
    ConfigError, ExchangeKind, ExchangeSettings, MonitorConfig, SamplingSettings, ServerSettings,
    SinkKind, SinkSettings,
};
