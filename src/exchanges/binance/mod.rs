//! Binance exchange integration.

mod account;
mod client;
mod websocket;

pub use account::BinanceAccount;
pub use client::Client;
pub use websocket::{FeedSettings, PriceFeed, StreamConnector, WsConnector};
#[cfg(test)]
pub use websocket::{FeedState, StreamError, TickStream};
