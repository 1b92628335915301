//! Windowed Microstructure Metrics
//!
//! Pure computation of bid/ask spread and realized trade slippage from a
//! [`MarketState`] window.
//!
//! # Definitions
//!
//! - spread: `(best_ask - best_bid) / best_ask * 100`, signed, never clamped
//! - trade slippage: `(best_ask - price) / price * 100`
//! - window slippage: mean of trade slippages at or below
//!   [`SLIPPAGE_THRESHOLD_PCT`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::{MarketState, TopOfBook};

/// Trades whose slippage exceeds this percentage are excluded from the mean.
pub const SLIPPAGE_THRESHOLD_PCT: f64 = 2.0;

/// Metrics sampled for one market over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcResult {
    /// Spread in percent, `None` without a usable top of book.
    pub spread: Option<f64>,
    /// Mean qualifying slippage in percent, `None` when nothing qualified.
    pub slippage: Option<f64>,
    /// Nonzero-price trades accumulated in the window.
    pub trade_count: usize,
    /// Sampling time of the window.
    pub timestamp: DateTime<Utc>,
}

/// Spread percentage for a quote, or `None` when the ask is zero.
#[must_use]
pub fn spread_pct(book: &TopOfBook) -> Option<f64> {
    if book.best_ask == 0.0 {
        return None;
    }
    Some((book.best_ask - book.best_bid) / book.best_ask * 100.0)
}

/// Slippage of a single trade against the best ask, or `None` for a zero price.
#[must_use]
pub fn trade_slippage_pct(best_ask: f64, price: f64) -> Option<f64> {
    if price == 0.0 {
        return None;
    }
    Some((best_ask - price) / price * 100.0)
}

/// Mean slippage over the qualifying trades of a window.
#[must_use]
pub fn slippage_pct(best_ask: f64, prices: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = prices
        .into_iter()
        .filter_map(|price| trade_slippage_pct(best_ask, price))
        .filter(|s| *s <= SLIPPAGE_THRESHOLD_PCT)
        .fold((0.0_f64, 0_u32), |(sum, count), s| (sum + s, count + 1));

    (count > 0).then(|| sum / f64::from(count))
}

/// Compute the window metrics for a market.
#[must_use]
pub fn compute(state: &MarketState, timestamp: DateTime<Utc>) -> CalcResult {
    // Zero-price ticks are neither counted nor divided by.
    let trade_count = state.trades().iter().filter(|t| t.price != 0.0).count();

    let Some(book) = state.top_of_book().filter(|book| book.best_ask != 0.0) else {
        return CalcResult {
            spread: None,
            slippage: None,
            trade_count,
            timestamp,
        };
    };

    CalcResult {
        spread: spread_pct(book),
        slippage: slippage_pct(book.best_ask, state.trades().iter().map(|t| t.price)),
        trade_count,
        timestamp,
    }
}
