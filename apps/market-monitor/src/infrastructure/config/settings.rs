//! Monitor Configuration Settings
//!
//! Configuration types for the market monitor, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::SchedulerConfig;
use crate::domain::market::{ResetPolicy, SnapshotMode};
use crate::domain::symbol::{SymbolTranslation, split_canonical};
use crate::infrastructure::exchange::binance::DEFAULT_STREAM_URL;
use crate::infrastructure::exchange::bootstrap::DEFAULT_BOOTSTRAP_URL;
use crate::infrastructure::exchange::kucoin::DEFAULT_ACK_TIMEOUT;
use crate::infrastructure::exchange::{BINANCE, KUCOIN};

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Binance combined streams.
    Binance,
    /// KuCoin public streams.
    Kucoin,
}

impl ExchangeKind {
    /// Parse an exchange name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Some(Self::Binance),
            "kucoin" => Some(Self::Kucoin),
            _ => None,
        }
    }

    /// Exchange name, also used as the batch source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => BINANCE,
            Self::Kucoin => KUCOIN,
        }
    }

    /// Exchange-native symbol for a canonical `BASE/QUOTE` symbol.
    ///
    /// `BTC/USDT` becomes `btcusdt` on Binance and `BTC-USDT` on KuCoin.
    #[must_use]
    pub fn native_symbol(&self, canonical: &str) -> Option<String> {
        let (base, quote) = split_canonical(canonical)?;
        Some(match self {
            Self::Binance => format!("{base}{quote}").to_lowercase(),
            Self::Kucoin => format!("{base}-{quote}").to_uppercase(),
        })
    }
}

/// Persistence sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Embedded Turso database.
    #[default]
    Turso,
    /// Structured log lines.
    Log,
}

impl SinkKind {
    /// Parse sink kind from string, defaulting to `Turso`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "log" => Self::Log,
            _ => Self::Turso,
        }
    }

    /// Sink name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Turso => "turso",
            Self::Log => "log",
        }
    }
}

/// Sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingSettings {
    /// Time between sampling ticks.
    pub interval: Duration,
    /// Clear the top of book after each tick.
    pub clear_top_of_book: bool,
    /// Isolation from concurrent decoding.
    pub snapshot_mode: SnapshotMode,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            clear_top_of_book: true,
            snapshot_mode: SnapshotMode::Live,
        }
    }
}

impl SamplingSettings {
    /// Scheduler configuration for these settings.
    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval,
            reset: ResetPolicy {
                clear_top_of_book: self.clear_top_of_book,
            },
            mode: self.snapshot_mode,
        }
    }
}

/// Exchange endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Binance combined-stream base URL.
    pub binance_stream_url: String,
    /// KuCoin bootstrap endpoint.
    pub kucoin_bootstrap_url: String,
    /// Handshake acknowledgement timeout.
    pub ack_timeout: Duration,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            binance_stream_url: DEFAULT_STREAM_URL.to_string(),
            kucoin_bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// Sink selection.
    pub kind: SinkKind,
    /// Database file for the Turso sink.
    pub db_path: PathBuf,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::Turso,
            db_path: PathBuf::from("./data/market_metrics.db"),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health and metrics HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Canonical markets, e.g. `BTC/USDT`.
    pub markets: Vec<String>,
    /// Exchanges in synchronizer order.
    pub exchanges: Vec<ExchangeKind>,
    /// Sampling settings.
    pub sampling: SamplingSettings,
    /// Exchange endpoint settings.
    pub endpoints: ExchangeSettings,
    /// Persistence settings.
    pub sink: SinkSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl MonitorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_markets =
            lookup("MONITOR_MARKETS").ok_or_else(|| ConfigError::MissingEnvVar("MONITOR_MARKETS".to_string()))?;
        let markets = split_list(&raw_markets);
        if markets.is_empty() {
            return Err(ConfigError::EmptyValue("MONITOR_MARKETS".to_string()));
        }
        if let Some(bad) = markets.iter().find(|m| split_canonical(m).is_none()) {
            return Err(ConfigError::InvalidValue {
                key: "MONITOR_MARKETS".to_string(),
                value: bad.clone(),
            });
        }

        let exchanges = match lookup("MONITOR_EXCHANGES") {
            Some(raw) => parse_exchanges(&raw)?,
            None => vec![ExchangeKind::Binance, ExchangeKind::Kucoin],
        };

        let defaults = SamplingSettings::default();
        let interval = match lookup("MONITOR_INTERVAL_SECS") {
            Some(raw) => parse_interval(&raw)?,
            None => defaults.interval,
        };
        let sampling = SamplingSettings {
            interval,
            clear_top_of_book: parse_bool(&lookup, "MONITOR_CLEAR_TOP_OF_BOOK", defaults.clear_top_of_book),
            snapshot_mode: lookup("MONITOR_SNAPSHOT_MODE")
                .map(|s| SnapshotMode::from_str_case_insensitive(&s))
                .unwrap_or_default(),
        };

        let endpoint_defaults = ExchangeSettings::default();
        let endpoints = ExchangeSettings {
            binance_stream_url: lookup("BINANCE_STREAM_URL")
                .unwrap_or(endpoint_defaults.binance_stream_url),
            kucoin_bootstrap_url: lookup("KUCOIN_BOOTSTRAP_URL")
                .unwrap_or(endpoint_defaults.kucoin_bootstrap_url),
            ack_timeout: parse_duration_millis(
                &lookup,
                "MONITOR_ACK_TIMEOUT_MS",
                endpoint_defaults.ack_timeout,
            ),
        };

        let sink = SinkSettings {
            kind: lookup("MONITOR_SINK")
                .map(|s| SinkKind::from_str_case_insensitive(&s))
                .unwrap_or_default(),
            db_path: lookup("MONITOR_DB_PATH")
                .map_or_else(|| SinkSettings::default().db_path, PathBuf::from),
        };

        let server = ServerSettings {
            health_port: parse_u16(&lookup, "MONITOR_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Ok(Self {
            markets,
            exchanges,
            sampling,
            endpoints,
            sink,
            server,
        })
    }

    /// Native symbols of every configured market on an exchange.
    #[must_use]
    pub fn native_markets(&self, exchange: ExchangeKind) -> Vec<String> {
        self.markets
            .iter()
            .filter_map(|m| exchange.native_symbol(m))
            .collect()
    }

    /// Native → canonical translation for every configured exchange.
    #[must_use]
    pub fn translation(&self) -> SymbolTranslation {
        let mut table = SymbolTranslation::new();
        for exchange in &self.exchanges {
            for canonical in &self.markets {
                if let Some(native) = exchange.native_symbol(canonical) {
                    table.insert(exchange.as_str(), native, canonical.as_str());
                }
            }
        }
        table
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_exchanges(raw: &str) -> Result<Vec<ExchangeKind>, ConfigError> {
    let mut exchanges = Vec::new();
    for name in split_list(raw) {
        let kind = ExchangeKind::parse(&name).ok_or_else(|| ConfigError::InvalidValue {
            key: "MONITOR_EXCHANGES".to_string(),
            value: name.clone(),
        })?;
        if !exchanges.contains(&kind) {
            exchanges.push(kind);
        }
    }

    if exchanges.is_empty() {
        return Err(ConfigError::EmptyValue("MONITOR_EXCHANGES".to_string()));
    }
    Ok(exchanges)
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "MONITOR_INTERVAL_SECS".to_string(),
            value: raw.to_string(),
        })
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key).map_or(default, |v| {
        match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        }
    })
}

fn parse_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<MonitorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MonitorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test_case(ExchangeKind::Binance, "BTC/USDT", Some("btcusdt") ; "binance lowercase")]
    #[test_case(ExchangeKind::Kucoin, "BTC/USDT", Some("BTC-USDT") ; "kucoin dashed")]
    #[test_case(ExchangeKind::Kucoin, "eth/usdc", Some("ETH-USDC") ; "kucoin uppercases")]
    #[test_case(ExchangeKind::Binance, "BTCUSDT", None ; "not canonical")]
    fn native_symbols(exchange: ExchangeKind, canonical: &str, expected: Option<&str>) {
        assert_eq!(exchange.native_symbol(canonical).as_deref(), expected);
    }

    #[test]
    fn defaults() {
        let config = config(&[("MONITOR_MARKETS", "BTC/USDT, ETH/USDT")]).unwrap();

        assert_eq!(config.markets, vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(config.exchanges, vec![ExchangeKind::Binance, ExchangeKind::Kucoin]);
        assert_eq!(config.sampling, SamplingSettings::default());
        assert_eq!(config.endpoints, ExchangeSettings::default());
        assert_eq!(config.sink, SinkSettings::default());
        assert_eq!(config.server.health_port, 8083);
        assert_eq!(config.endpoints.ack_timeout, Duration::from_secs(1));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("MONITOR_MARKETS", "BTC/USDT"),
            ("MONITOR_EXCHANGES", "kucoin"),
            ("MONITOR_INTERVAL_SECS", "0.5"),
            ("MONITOR_ACK_TIMEOUT_MS", "250"),
            ("MONITOR_CLEAR_TOP_OF_BOOK", "false"),
            ("MONITOR_SNAPSHOT_MODE", "barrier"),
            ("MONITOR_SINK", "log"),
            ("MONITOR_DB_PATH", "/tmp/x.db"),
            ("MONITOR_HEALTH_PORT", "0"),
        ])
        .unwrap();

        assert_eq!(config.exchanges, vec![ExchangeKind::Kucoin]);
        assert_eq!(config.sampling.interval, Duration::from_millis(500));
        assert!(!config.sampling.clear_top_of_book);
        assert_eq!(config.sampling.snapshot_mode, SnapshotMode::Barrier);
        assert_eq!(config.endpoints.ack_timeout, Duration::from_millis(250));
        assert_eq!(config.sink.kind, SinkKind::Log);
        assert_eq!(config.sink.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.server.health_port, 0);
        assert!(!config.sampling.scheduler().reset.clear_top_of_book);
    }

    #[test]
    fn missing_markets() {
        assert_eq!(
            config(&[]).unwrap_err(),
            ConfigError::MissingEnvVar("MONITOR_MARKETS".to_string())
        );
        assert_eq!(
            config(&[("MONITOR_MARKETS", " , ")]).unwrap_err(),
            ConfigError::EmptyValue("MONITOR_MARKETS".to_string())
        );
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            config(&[("MONITOR_MARKETS", "BTCUSDT")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("MONITOR_MARKETS", "BTC/USDT"), ("MONITOR_EXCHANGES", "okx")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("MONITOR_MARKETS", "BTC/USDT"), ("MONITOR_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn translation_covers_every_exchange() {
        let config = config(&[("MONITOR_MARKETS", "BTC/USDT")]).unwrap();
        let table = config.translation();

        assert_eq!(table.canonical("binance", "btcusdt"), Some("BTC/USDT"));
        assert_eq!(table.canonical("kucoin", "BTC-USDT"), Some("BTC/USDT"));
        assert_eq!(config.native_markets(ExchangeKind::Kucoin), vec!["BTC-USDT"]);
    }
}
