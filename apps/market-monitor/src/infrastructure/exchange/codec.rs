//! Frame Codec
//!
//! Decodes inbound JSON frames into market events by matching their shape,
//! and routes those events into a [`MarketStore`].
//!
//! Prices may arrive as JSON strings (both exchanges send them that way) or
//! as JSON numbers; either way they must parse to a finite `f64`.

use serde_json::Value;

use crate::application::ports::TransportError;
use crate::domain::market::{MarketStore, TopOfBook, TradeTick};
use crate::infrastructure::metrics::{FrameKind, record_frame};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Top-of-book update.
    Ticker {
        /// Native market.
        market: String,
        /// New quote.
        book: TopOfBook,
    },
    /// Trade to append.
    Trade {
        /// Native market.
        market: String,
        /// Executed trade.
        tick: TradeTick,
    },
    /// Trade dropped by the side filter.
    FilteredTrade {
        /// Native market.
        market: String,
    },
    /// Protocol control message (welcome, ack, pong).
    Control {
        /// Message type.
        kind: String,
    },
    /// Valid JSON of another shape.
    Unroutable,
}

/// Parse a text frame as JSON.
///
/// # Errors
///
/// Returns [`TransportError::MalformedFrame`] if the text is not JSON.
pub fn parse_frame(text: &str) -> Result<Value, TransportError> {
    serde_json::from_str(text).map_err(|e| TransportError::MalformedFrame(e.to_string()))
}

/// Read a price field given as a string or a number.
///
/// # Errors
///
/// Returns [`TransportError::MalformedFrame`] if the field is missing or not a
/// finite number.
pub fn parse_price(data: &Value, field: &str) -> Result<f64, TransportError> {
    let price = match data.get(field) {
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    price
        .filter(|p| p.is_finite())
        .ok_or_else(|| TransportError::MalformedFrame(format!("field '{field}' is not a number")))
}

/// Decode a Binance combined-stream frame.
///
/// # Errors
///
/// Returns [`TransportError::MalformedFrame`] for a ticker or trade frame with
/// unusable prices.
pub fn decode_binance(frame: &Value) -> Result<MarketEvent, TransportError> {
    let Some(stream) = frame.get("stream").and_then(Value::as_str) else {
        return Ok(MarketEvent::Unroutable);
    };
    let Some((market, channel)) = stream.split_once('@') else {
        return Ok(MarketEvent::Unroutable);
    };
    let data = frame.get("data").unwrap_or(&Value::Null);

    match channel {
        "ticker" => Ok(MarketEvent::Ticker {
            market: market.to_string(),
            book: TopOfBook::new(parse_price(data, "a")?, parse_price(data, "b")?),
        }),
        "trade" => Ok(MarketEvent::Trade {
            market: market.to_string(),
            tick: TradeTick::new(parse_price(data, "p")?),
        }),
        _ => Ok(MarketEvent::Unroutable),
    }
}

/// Decode a KuCoin frame.
///
/// Market data is matched by shape: `data.bestAsk`/`data.bestBid` is a ticker,
/// `data.price` with `data.side` is a trade. Only buy-side trades are kept.
///
/// # Errors
///
/// Returns [`TransportError::MalformedFrame`] for a ticker or trade frame with
/// unusable prices.
pub fn decode_kucoin(frame: &Value) -> Result<MarketEvent, TransportError> {
    let kind = frame.get("type").and_then(Value::as_str).unwrap_or_default();
    if kind != "message" {
        return Ok(if kind.is_empty() {
            MarketEvent::Unroutable
        } else {
            MarketEvent::Control {
                kind: kind.to_string(),
            }
        });
    }

    let Some(market) = frame
        .get("topic")
        .and_then(Value::as_str)
        .and_then(|topic| topic.split_once(':'))
        .map(|(_, market)| market.to_string())
    else {
        return Ok(MarketEvent::Unroutable);
    };
    let Some(data) = frame.get("data").filter(|d| d.is_object()) else {
        return Ok(MarketEvent::Unroutable);
    };

    if data.get("bestAsk").is_some() && data.get("bestBid").is_some() {
        return Ok(MarketEvent::Ticker {
            market,
            book: TopOfBook::new(parse_price(data, "bestAsk")?, parse_price(data, "bestBid")?),
        });
    }

    if data.get("price").is_some() {
        return match data.get("side").and_then(Value::as_str) {
            Some("buy") => Ok(MarketEvent::Trade {
                market,
                tick: TradeTick::new(parse_price(data, "price")?),
            }),
            Some(_) => Ok(MarketEvent::FilteredTrade { market }),
            None => Ok(MarketEvent::Unroutable),
        };
    }

    Ok(MarketEvent::Unroutable)
}

/// Apply an event to the store and count it.
///
/// Returns the frame kind recorded; events for markets outside the store are
/// counted as unroutable.
pub fn route(source: &str, store: &MarketStore, event: MarketEvent) -> FrameKind {
    let kind = match event {
        MarketEvent::Ticker { market, book } => {
            if store.update_top_of_book(&market, book) {
                FrameKind::Ticker
            } else {
                FrameKind::Unroutable
            }
        }
        MarketEvent::Trade { market, tick } => {
            if store.push_trade(&market, tick) {
                FrameKind::Trade
            } else {
                FrameKind::Unroutable
            }
        }
        MarketEvent::FilteredTrade { .. } => FrameKind::FilteredTrade,
        MarketEvent::Control { kind } => {
            tracing::trace!(source = %source, kind = %kind, "Control message");
            FrameKind::Control
        }
        MarketEvent::Unroutable => FrameKind::Unroutable,
    };

    record_frame(source, kind);
    kind
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(json!({"a": "1.5"}), Some(1.5) ; "string price")]
    #[test_case(json!({"a": 2.25}), Some(2.25) ; "number price")]
    #[test_case(json!({"a": "abc"}), None ; "text price")]
    #[test_case(json!({"a": "NaN"}), None ; "nan price")]
    #[test_case(json!({"a": null}), None ; "null price")]
    #[test_case(json!({}), None ; "missing price")]
    fn price_parsing(data: Value, expected: Option<f64>) {
        assert_eq!(parse_price(&data, "a").ok(), expected);
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_frame("not json"),
            Err(TransportError::MalformedFrame(_))
        ));
    }

    #[test]
    fn binance_ticker_and_trade() {
        let ticker = json!({"stream": "btcusdt@ticker", "data": {"a": "100.0", "b": "99.0"}});
        assert_eq!(
            decode_binance(&ticker).unwrap(),
            MarketEvent::Ticker {
                market: "btcusdt".to_string(),
                book: TopOfBook::new(100.0, 99.0),
            }
        );

        let trade = json!({"stream": "btcusdt@trade", "data": {"p": "99.5", "m": true}});
        assert_eq!(
            decode_binance(&trade).unwrap(),
            MarketEvent::Trade {
                market: "btcusdt".to_string(),
                tick: TradeTick::new(99.5),
            }
        );
    }

    #[test]
    fn binance_other_shapes_are_unroutable() {
        assert_eq!(decode_binance(&json!({"result": null, "id": 1})).unwrap(), MarketEvent::Unroutable);
        assert_eq!(
            decode_binance(&json!({"stream": "btcusdt@depth", "data": {}})).unwrap(),
            MarketEvent::Unroutable
        );
    }

    #[test]
    fn binance_bad_numbers_are_malformed() {
        let ticker = json!({"stream": "btcusdt@ticker", "data": {"a": "x", "b": "99.0"}});
        assert!(decode_binance(&ticker).is_err());
    }

    #[test]
    fn kucoin_ticker() {
        let frame = json!({
            "type": "message",
            "topic": "/market/ticker:BTC-USDT",
            "subject": "trade.ticker",
            "data": {"bestAsk": "100", "bestBid": "99", "price": "99.5"}
        });
        assert_eq!(
            decode_kucoin(&frame).unwrap(),
            MarketEvent::Ticker {
                market: "BTC-USDT".to_string(),
                book: TopOfBook::new(100.0, 99.0),
            }
        );
    }

    #[test]
    fn kucoin_trades_filtered_by_side() {
        let buy = json!({
            "type": "message",
            "topic": "/market/match:BTC-USDT",
            "data": {"price": "99.5", "side": "buy", "size": "0.1"}
        });
        let sell = json!({
            "type": "message",
            "topic": "/market/match:BTC-USDT",
            "data": {"price": "99.5", "side": "sell"}
        });

        assert_eq!(
            decode_kucoin(&buy).unwrap(),
            MarketEvent::Trade {
                market: "BTC-USDT".to_string(),
                tick: TradeTick::new(99.5),
            }
        );
        assert_eq!(
            decode_kucoin(&sell).unwrap(),
            MarketEvent::FilteredTrade {
                market: "BTC-USDT".to_string()
            }
        );
    }

    #[test]
    fn kucoin_control_messages() {
        assert_eq!(
            decode_kucoin(&json!({"id": "x", "type": "pong"})).unwrap(),
            MarketEvent::Control {
                kind: "pong".to_string()
            }
        );
        assert_eq!(decode_kucoin(&json!([1, 2])).unwrap(), MarketEvent::Unroutable);
    }

    #[test]
    fn route_updates_store() {
        let store = MarketStore::new(["btcusdt"]);

        let kind = route(
            "binance",
            &store,
            MarketEvent::Ticker {
                market: "btcusdt".to_string(),
                book: TopOfBook::new(100.0, 99.0),
            },
        );
        assert_eq!(kind, FrameKind::Ticker);

        let kind = route(
            "binance",
            &store,
            MarketEvent::Trade {
                market: "ethusdt".to_string(),
                tick: TradeTick::new(1.0),
            },
        );
        assert_eq!(kind, FrameKind::Unroutable);

        let state = store.snapshot("btcusdt").unwrap();
        assert_eq!(state.top_of_book(), Some(&TopOfBook::new(100.0, 99.0)));
        assert!(state.trades().is_empty());
    }
}
