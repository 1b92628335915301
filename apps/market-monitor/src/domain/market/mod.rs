//! Per-Market State
//!
//! Mutable top-of-book and trade-window state for every market a connector
//! subscribes to. One [`MarketStore`] is created per connector and shared
//! (through an `Arc`) between that connector's decode loop and its sampling
//! scheduler only.
//!
//! # Locking
//!
//! Every market sits behind its own short-held mutex that is never held
//! across an `.await`. The mutex gives memory safety on a multi-threaded
//! runtime; it does not order frames against sampling ticks. Which frames
//! land before a given tick stays nondeterministic unless the scheduler
//! samples under [`SnapshotMode::Barrier`], which holds the store-wide gate
//! for the whole sample.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

// =============================================================================
// Value Types
// =============================================================================

/// Best available ask and bid for a market at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopOfBook {
    /// Best (lowest) ask price.
    pub best_ask: f64,
    /// Best (highest) bid price.
    pub best_bid: f64,
}

impl TopOfBook {
    /// Create a top-of-book quote.
    #[must_use]
    pub const fn new(best_ask: f64, best_bid: f64) -> Self {
        Self { best_ask, best_bid }
    }
}

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Execution price.
    pub price: f64,
}

impl TradeTick {
    /// Create a trade tick.
    #[must_use]
    pub const fn new(price: f64) -> Self {
        Self { price }
    }
}

// =============================================================================
// Market State
// =============================================================================

/// State accumulated for one market during the current sampling window.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    market: String,
    top_of_book: Option<TopOfBook>,
    trades: Vec<TradeTick>,
    last_sample: Option<DateTime<Utc>>,
}

impl MarketState {
    /// Create empty state for a market. No ticker has arrived yet.
    #[must_use]
    pub fn new(market: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            top_of_book: None,
            trades: Vec::new(),
            last_sample: None,
        }
    }

    /// Replace the top of book (builder style, mostly for tests).
    #[must_use]
    pub const fn with_top_of_book(mut self, book: TopOfBook) -> Self {
        self.top_of_book = Some(book);
        self
    }

    /// Append trades in order (builder style, mostly for tests).
    #[must_use]
    pub fn with_trades(mut self, prices: impl IntoIterator<Item = f64>) -> Self {
        self.trades.extend(prices.into_iter().map(TradeTick::new));
        self
    }

    /// Exchange-native market symbol.
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Latest top of book, if any ticker arrived since the last reset.
    #[must_use]
    pub const fn top_of_book(&self) -> Option<&TopOfBook> {
        self.top_of_book.as_ref()
    }

    /// Trades accumulated since the last sampling tick, in arrival order.
    #[must_use]
    pub fn trades(&self) -> &[TradeTick] {
        &self.trades
    }

    /// Time stamped by the most recent sampling tick, if any.
    #[must_use]
    pub const fn last_sample(&self) -> Option<DateTime<Utc>> {
        self.last_sample
    }

    /// Overwrite the top of book with the latest ticker.
    pub const fn set_top_of_book(&mut self, book: TopOfBook) {
        self.top_of_book = Some(book);
    }

    /// Append a trade to the current window.
    pub fn push_trade(&mut self, tick: TradeTick) {
        self.trades.push(tick);
    }

    /// Record the sampling time.
    pub const fn stamp(&mut self, at: DateTime<Utc>) {
        self.last_sample = Some(at);
    }

    /// Start a new window: trades are always cleared, the top of book only
    /// when the policy asks for it.
    pub fn reset(&mut self, policy: ResetPolicy) {
        self.trades.clear();
        if policy.clear_top_of_book {
            self.top_of_book = None;
        }
    }
}

// =============================================================================
// Sampling Policies
// =============================================================================

/// What a sampling tick clears after computing metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    /// Also drop the top of book, so the next window reports no spread until
    /// a fresh ticker arrives.
    pub clear_top_of_book: bool,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            clear_top_of_book: true,
        }
    }
}

impl ResetPolicy {
    /// Keep the last top of book across windows.
    #[must_use]
    pub const fn keep_top_of_book() -> Self {
        Self {
            clear_top_of_book: false,
        }
    }
}

/// How a sampling tick isolates itself from concurrent frame decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    /// Sample market by market while decoding continues.
    #[default]
    Live,
    /// Block decoding for the whole sample so every market's window closes at
    /// the same logical instant.
    Barrier,
}

impl SnapshotMode {
    /// Parse mode from string, defaulting to `Live`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "barrier" => Self::Barrier,
            _ => Self::Live,
        }
    }

    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Barrier => "barrier",
        }
    }
}

// =============================================================================
// Market Store
// =============================================================================

/// All market states owned by one connector.
#[derive(Debug)]
pub struct MarketStore {
    gate: RwLock<()>,
    markets: BTreeMap<String, Mutex<MarketState>>,
}

impl MarketStore {
    /// Create a store with one empty state per market.
    #[must_use]
    pub fn new<I, S>(markets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let markets = markets
            .into_iter()
            .map(Into::into)
            .map(|market: String| (market.clone(), Mutex::new(MarketState::new(market))))
            .collect();

        Self {
            gate: RwLock::new(()),
            markets,
        }
    }

    /// Subscribed markets in sorted order.
    pub fn markets(&self) -> impl Iterator<Item = &str> {
        self.markets.keys().map(String::as_str)
    }

    /// Number of subscribed markets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether the store has no markets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Whether the market is subscribed.
    #[must_use]
    pub fn contains(&self, market: &str) -> bool {
        self.markets.contains_key(market)
    }

    /// Overwrite a market's top of book.
    ///
    /// Returns `false` if the market is not subscribed.
    pub fn update_top_of_book(&self, market: &str, book: TopOfBook) -> bool {
        self.with_market(market, |state| state.set_top_of_book(book))
            .is_some()
    }

    /// Append a trade to a market's window.
    ///
    /// Returns `false` if the market is not subscribed.
    pub fn push_trade(&self, market: &str, tick: TradeTick) -> bool {
        self.with_market(market, |state| state.push_trade(tick))
            .is_some()
    }

    /// Copy of a market's current state.
    #[must_use]
    pub fn snapshot(&self, market: &str) -> Option<MarketState> {
        self.markets.get(market).map(|state| state.lock().clone())
    }

    /// Run a mutation against one market while holding the shared gate.
    pub fn with_market<R>(&self, market: &str, f: impl FnOnce(&mut MarketState) -> R) -> Option<R> {
        let state = self.markets.get(market)?;
        let _gate = self.gate.read();
        let mut guard = state.lock();
        Some(f(&mut guard))
    }

    /// Visit every market in sorted order.
    ///
    /// Under [`SnapshotMode::Barrier`] the exclusive gate is held for the
    /// whole visit, so no decode update interleaves between markets.
    pub fn for_each_market(&self, mode: SnapshotMode, mut f: impl FnMut(&mut MarketState)) {
        let _barrier = match mode {
            SnapshotMode::Barrier => Some(self.gate.write()),
            SnapshotMode::Live => None,
        };

        for state in self.markets.values() {
            let mut guard = state.lock();
            f(&mut guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_no_ticker_and_no_trades() {
        let state = MarketState::new("btcusdt");
        assert_eq!(state.market(), "btcusdt");
        assert!(state.top_of_book().is_none());
        assert!(state.trades().is_empty());
        assert!(state.last_sample().is_none());
    }

    #[test]
    fn ticker_overwrites_previous_value() {
        let mut state = MarketState::new("btcusdt");
        state.set_top_of_book(TopOfBook::new(100.0, 99.0));
        state.set_top_of_book(TopOfBook::new(101.0, 100.5));

        assert_eq!(state.top_of_book(), Some(&TopOfBook::new(101.0, 100.5)));
    }

    #[test]
    fn trades_keep_arrival_order() {
        let state = MarketState::new("btcusdt").with_trades([3.0, 1.0, 2.0]);
        let prices: Vec<f64> = state.trades().iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn reset_clears_trades_and_optionally_ticker() {
        let mut state = MarketState::new("btcusdt")
            .with_top_of_book(TopOfBook::new(100.0, 99.0))
            .with_trades([99.0, 100.0]);

        state.reset(ResetPolicy::keep_top_of_book());
        assert!(state.trades().is_empty());
        assert!(state.top_of_book().is_some());

        state.push_trade(TradeTick::new(98.0));
        state.reset(ResetPolicy::default());
        assert!(state.trades().is_empty());
        assert!(state.top_of_book().is_none());
    }

    #[test]
    fn store_ignores_unknown_markets() {
        let store = MarketStore::new(["btcusdt"]);

        assert!(!store.update_top_of_book("ethusdt", TopOfBook::new(1.0, 1.0)));
        assert!(!store.push_trade("ethusdt", TradeTick::new(1.0)));
        assert!(store.snapshot("ethusdt").is_none());
    }

    #[test]
    fn store_routes_updates_to_market() {
        let store = MarketStore::new(["btcusdt", "ethusdt"]);

        assert!(store.update_top_of_book("ethusdt", TopOfBook::new(2.0, 1.5)));
        assert!(store.push_trade("ethusdt", TradeTick::new(1.9)));

        let eth = store.snapshot("ethusdt").unwrap();
        assert_eq!(eth.top_of_book(), Some(&TopOfBook::new(2.0, 1.5)));
        assert_eq!(eth.trades().len(), 1);

        let btc = store.snapshot("btcusdt").unwrap();
        assert!(btc.top_of_book().is_none());
    }

    #[test]
    fn for_each_market_visits_sorted() {
        let store = MarketStore::new(["xrpusdt", "btcusdt", "ethusdt"]);

        for mode in [SnapshotMode::Live, SnapshotMode::Barrier] {
            let mut seen = Vec::new();
            store.for_each_market(mode, |state| seen.push(state.market().to_string()));
            assert_eq!(seen, vec!["btcusdt", "ethusdt", "xrpusdt"]);
        }
    }

    #[test]
    fn snapshot_mode_parsing() {
        assert_eq!(
            SnapshotMode::from_str_case_insensitive("BARRIER"),
            SnapshotMode::Barrier
        );
        assert_eq!(
            SnapshotMode::from_str_case_insensitive("live"),
            SnapshotMode::Live
        );
        assert_eq!(
            SnapshotMode::from_str_case_insensitive("other"),
            SnapshotMode::Live
        );
    }
}
