//! Exchange integration abstractions and the Binance implementation.

pub mod binance;
mod utils;

use crate::domain::{Credentials, IsolatedPair, MarginAsset, SpotBalance};
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Exchange errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// API key or secret is missing. Raised before any request is sent.
    #[error("API credentials are not configured")]
    NotConfigured,

    /// Transport failure or an unusable response.
    #[error("upstream request failed: {0}")]
    UpstreamRequest(String),

    /// Error reported by the exchange.
    #[error("binance api error {code}: {message}")]
    Api { code: i64, message: String },

    /// No price could be obtained for a symbol, fresh or cached.
    #[error("price unavailable for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::UpstreamRequest(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::UpstreamRequest(format!("decode response: {}", err))
    }
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Raw reads of the three account types.
///
/// Implementations return every entry the exchange reports; filtering and
/// failure tolerance belong to the callers.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Reads the spot account balances.
    async fn spot_balances(&self) -> Result<Vec<SpotBalance>>;

    /// Reads the cross margin account assets.
    async fn cross_margin_assets(&self) -> Result<Vec<MarginAsset>>;

    /// Reads every isolated margin pair.
    async fn isolated_margin_pairs(&self) -> Result<Vec<IsolatedPair>>;

    /// Returns true if credentials are present.
    fn is_configured(&self) -> bool;

    /// Replaces the credentials used for signed requests.
    fn set_credentials(&self, credentials: Credentials);
}

/// Single-symbol price lookup.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches the latest price of `symbol` (e.g. "BTCUSDT").
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal>;
}
