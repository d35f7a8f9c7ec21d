//! In-memory account and price doubles shared by the balance and status tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use crate::domain::{Credentials, IsolatedAsset, IsolatedPair, MarginAsset, SpotBalance};
use crate::exchanges::{AccountApi, ExchangeError, PriceSource, Result};

pub(crate) fn spot(asset: &str, free: Decimal, locked: Decimal) -> SpotBalance {
    SpotBalance {
        asset: asset.to_string(),
        free,
        locked,
    }
}

pub(crate) fn margin(asset: &str, net_asset: Decimal) -> MarginAsset {
    MarginAsset {
        asset: asset.to_string(),
        free: net_asset.max(Decimal::ZERO),
        locked: Decimal::ZERO,
        borrowed: (-net_asset).max(Decimal::ZERO),
        interest: Decimal::ZERO,
        net_asset,
    }
}

fn isolated_side(asset: &str, net_asset: Decimal) -> IsolatedAsset {
    IsolatedAsset {
        asset: asset.to_string(),
        free: net_asset.max(Decimal::ZERO),
        locked: Decimal::ZERO,
        borrowed: (-net_asset).max(Decimal::ZERO),
        interest: Decimal::ZERO,
        net_asset,
    }
}

pub(crate) fn isolated(
    symbol: &str,
    (base, base_net): (&str, Decimal),
    (quote, quote_net): (&str, Decimal),
) -> IsolatedPair {
    IsolatedPair {
        symbol: symbol.to_string(),
        base: isolated_side(base, base_net),
        quote: isolated_side(quote, quote_net),
    }
}

/// Account double. Margin reads fail like an account that was never opened
/// unless holdings were given.
pub(crate) struct MockAccount {
    spot: Vec<SpotBalance>,
    margin: Option<Vec<MarginAsset>>,
    isolated: Option<Vec<IsolatedPair>>,
    spot_fails: AtomicBool,
    credentials: Mutex<Credentials>,
    requests: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl MockAccount {
    pub(crate) fn new() -> Self {
        Self {
            spot: Vec::new(),
            margin: Some(Vec::new()),
            isolated: Some(Vec::new()),
            spot_fails: AtomicBool::new(false),
            credentials: Mutex::new(Credentials::new("key", "secret")),
            requests: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub(crate) fn with_spot(mut self, balances: Vec<SpotBalance>) -> Self {
        self.spot = balances;
        self
    }

    pub(crate) fn with_margin(mut self, assets: Vec<MarginAsset>) -> Self {
        self.margin = Some(assets);
        self
    }

    pub(crate) fn with_isolated(mut self, pairs: Vec<IsolatedPair>) -> Self {
        self.isolated = Some(pairs);
        self
    }

    pub(crate) fn without_margin_accounts(mut self) -> Self {
        self.margin = None;
        self.isolated = None;
        self
    }

    /// Cross margin reads fail; isolated margin keeps its holdings.
    pub(crate) fn without_cross_margin(mut self) -> Self {
        self.margin = None;
        self
    }

    pub(crate) fn unconfigured(self) -> Self {
        *self.credentials.lock().unwrap() = Credentials::default();
        self
    }

    /// Holds every spot read until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn fail_spot(&self, fail: bool) {
        self.spot_fails.store(fail, Ordering::SeqCst);
    }

    /// Number of account reads of any type.
    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn credentials(&self) -> Credentials {
        self.credentials.lock().unwrap().clone()
    }

    fn margin_account_missing() -> ExchangeError {
        ExchangeError::Api {
            code: -3003,
            message: "Margin account does not exist.".into(),
        }
    }
}

#[async_trait]
impl AccountApi for MockAccount {
    async fn spot_balances(&self) -> Result<Vec<SpotBalance>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.spot_fails.load(Ordering::SeqCst) {
            return Err(ExchangeError::UpstreamRequest("connection reset".into()));
        }
        Ok(self.spot.clone())
    }

    async fn cross_margin_assets(&self) -> Result<Vec<MarginAsset>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.margin.clone().ok_or_else(Self::margin_account_missing)
    }

    async fn isolated_margin_pairs(&self) -> Result<Vec<IsolatedPair>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.isolated.clone().ok_or_else(Self::margin_account_missing)
    }

    fn is_configured(&self) -> bool {
        self.credentials.lock().unwrap().is_configured()
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock().unwrap() = credentials;
    }
}

/// Ticker double serving a mutable price table.
pub(crate) struct MockPrices {
    prices: Mutex<HashMap<String, Decimal>>,
    calls: AtomicUsize,
}

impl MockPrices {
    pub(crate) fn new(entries: &[(&str, Decimal)]) -> Self {
        Self {
            prices: Mutex::new(
                entries
                    .iter()
                    .map(|(symbol, price)| (symbol.to_string(), *price))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::Api {
                code: -1121,
                message: "Invalid symbol.".into(),
            })
    }
}
