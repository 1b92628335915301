//! Exchange WebSocket Adapters
//!
//! Implements `ExchangeConnector` for the supported exchanges:
//!
//! - **Binance**: combined streams, subscriptions in the URL (simple variant)
//! - **KuCoin**: token bootstrap, auth and acknowledged subscriptions
//!   (handshake variant)

pub mod binance;
pub mod bootstrap;
pub mod codec;
pub mod handshake;
pub mod kucoin;
pub mod messages;
pub mod session;
pub mod stream;

pub use binance::{BINANCE, BinanceConfig, BinanceConnector};
pub use bootstrap::{BootstrapClient, SessionGrant};
pub use codec::MarketEvent;
pub use handshake::await_frame_of_type;
pub use kucoin::{KUCOIN, KucoinConfig, KucoinConnector};
