use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::exchanges::{ExchangeError, PriceSource, Result};

/// Symbol to price map fed by the ticker stream and REST lookups.
///
/// Keys are uppercase pair symbols. Every write replaces the previous
/// value for the symbol, whichever source it came from.
pub struct PriceCache {
    prices: RwLock<HashMap<String, Decimal>>,
    source: Arc<dyn PriceSource>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            source,
        }
    }

    /// Stores a price unconditionally.
    pub fn put(&self, symbol: &str, price: Decimal) {
        let key = symbol.to_uppercase();
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, price);
    }

    /// Returns the cached price without any network access.
    pub fn cached(&self, symbol: &str) -> Option<Decimal> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&symbol.to_uppercase())
            .copied()
    }

    /// Resolves a price.
    ///
    /// With `prefer_cache` a cached entry is returned as is. Otherwise, or
    /// when nothing is cached, the price is fetched and stored. A failed
    /// fetch falls back to the cached entry and only fails with
    /// `PriceUnavailable` when there is none.
    pub async fn get(&self, symbol: &str, prefer_cache: bool) -> Result<Decimal> {
        let key = symbol.to_uppercase();

        if prefer_cache {
            if let Some(price) = self.cached(&key) {
                return Ok(price);
            }
        }

        match self.source.ticker_price(&key).await {
            Ok(price) => {
                debug!(symbol = %key, price = %price, "price fetched");
                self.put(&key, price);
                Ok(price)
            }
            Err(e) => match self.cached(&key) {
                Some(price) => {
                    warn!(symbol = %key, error = %e, "price fetch failed, using cached value");
                    Ok(price)
                }
                None => Err(ExchangeError::PriceUnavailable {
                    symbol: key,
                    reason: e.to_string(),
                }),
            },
        }
    }
}
