use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::ExchangeConfig;
use crate::domain::{Credentials, IsolatedAsset, IsolatedPair, MarginAsset, SpotBalance};
use crate::exchanges::binance::Client;
use crate::exchanges::utils::{normalize_symbol, parse_decimal};
use crate::exchanges::{AccountApi, ExchangeError, PriceSource, Result};

const SPOT_ACCOUNT_ENDPOINT: &str = "/api/v3/account";
const CROSS_MARGIN_ACCOUNT_ENDPOINT: &str = "/sapi/v1/margin/account";
const ISOLATED_MARGIN_ACCOUNT_ENDPOINT: &str = "/sapi/v1/margin/isolated/account";
const TICKER_PRICE_ENDPOINT: &str = "/api/v3/ticker/price";

/// Binance account reads over the REST API.
pub struct BinanceAccount {
    client: Client,
}

impl BinanceAccount {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates the account reader from exchange config.
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        Ok(Self::new(Client::from_config(config)?))
    }
}

#[async_trait]
impl AccountApi for BinanceAccount {
    async fn spot_balances(&self) -> Result<Vec<SpotBalance>> {
        let body = self
            .client
            .get_signed(SPOT_ACCOUNT_ENDPOINT, BTreeMap::new())
            .await?;
        let balances = parse_spot_account(&body)?;
        debug!(count = balances.len(), "fetched spot balances");
        Ok(balances)
    }

    async fn cross_margin_assets(&self) -> Result<Vec<MarginAsset>> {
        let body = self
            .client
            .get_signed(CROSS_MARGIN_ACCOUNT_ENDPOINT, BTreeMap::new())
            .await?;
        let assets = parse_cross_margin_account(&body)?;
        debug!(count = assets.len(), "fetched cross margin assets");
        Ok(assets)
    }

    async fn isolated_margin_pairs(&self) -> Result<Vec<IsolatedPair>> {
        let body = self
            .client
            .get_signed(ISOLATED_MARGIN_ACCOUNT_ENDPOINT, BTreeMap::new())
            .await?;
        let pairs = parse_isolated_margin_account(&body)?;
        debug!(count = pairs.len(), "fetched isolated margin pairs");
        Ok(pairs)
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    fn set_credentials(&self, credentials: Credentials) {
        self.client.set_credentials(credentials);
    }
}

#[async_trait]
impl PriceSource for BinanceAccount {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal> {
        let symbol = normalize_symbol(symbol);
        let mut params = BTreeMap::new();
        params.insert("symbol".to_string(), symbol.clone());

        let body = self.client.get_public(TICKER_PRICE_ENDPOINT, &params).await?;
        parse_ticker_price(&body, &symbol)
    }
}

/// `GET /api/v3/account` response.
#[derive(Debug, Deserialize)]
struct SpotAccountResponse {
    balances: Vec<SpotBalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct SpotBalanceEntry {
    asset: String,
    free: String,
    locked: String,
}

/// `GET /sapi/v1/margin/account` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrossMarginResponse {
    user_assets: Vec<MarginAssetEntry>,
}

/// Asset entry shared by the cross and isolated margin responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarginAssetEntry {
    asset: String,
    #[serde(default)]
    free: String,
    #[serde(default)]
    locked: String,
    #[serde(default)]
    borrowed: String,
    #[serde(default)]
    interest: String,
    #[serde(default)]
    net_asset: String,
}

/// `GET /sapi/v1/margin/isolated/account` response.
#[derive(Debug, Deserialize)]
struct IsolatedMarginResponse {
    assets: Vec<IsolatedPairEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IsolatedPairEntry {
    symbol: String,
    base_asset: MarginAssetEntry,
    quote_asset: MarginAssetEntry,
}

/// `GET /api/v3/ticker/price` response.
#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    symbol: String,
    price: String,
}

impl MarginAssetEntry {
    fn to_margin_asset(&self) -> MarginAsset {
        MarginAsset {
            asset: self.asset.clone(),
            free: parse_decimal(&self.free),
            locked: parse_decimal(&self.locked),
            borrowed: parse_decimal(&self.borrowed),
            interest: parse_decimal(&self.interest),
            net_asset: parse_decimal(&self.net_asset),
        }
    }

    fn to_isolated_asset(&self) -> IsolatedAsset {
        IsolatedAsset {
            asset: self.asset.clone(),
            free: parse_decimal(&self.free),
            locked: parse_decimal(&self.locked),
            borrowed: parse_decimal(&self.borrowed),
            interest: parse_decimal(&self.interest),
            net_asset: parse_decimal(&self.net_asset),
        }
    }
}

fn parse_spot_account(body: &[u8]) -> Result<Vec<SpotBalance>> {
    let resp: SpotAccountResponse = serde_json::from_slice(body)?;
    Ok(resp
        .balances
        .into_iter()
        .map(|b| SpotBalance {
            free: parse_decimal(&b.free),
            locked: parse_decimal(&b.locked),
            asset: b.asset,
        })
        .collect())
}

fn parse_cross_margin_account(body: &[u8]) -> Result<Vec<MarginAsset>> {
    let resp: CrossMarginResponse = serde_json::from_slice(body)?;
    Ok(resp
        .user_assets
        .iter()
        .map(MarginAssetEntry::to_margin_asset)
        .collect())
}

fn parse_isolated_margin_account(body: &[u8]) -> Result<Vec<IsolatedPair>> {
    let resp: IsolatedMarginResponse = serde_json::from_slice(body)?;
    Ok(resp
        .assets
        .iter()
        .map(|pair| IsolatedPair {
            symbol: pair.symbol.clone(),
            base: pair.base_asset.to_isolated_asset(),
            quote: pair.quote_asset.to_isolated_asset(),
        })
        .collect())
}

fn parse_ticker_price(body: &[u8], symbol: &str) -> Result<Decimal> {
    let resp: TickerPriceResponse = serde_json::from_slice(body)?;
    let price = parse_decimal(&resp.price);
    if price.is_zero() || price.is_sign_negative() {
        return Err(ExchangeError::UpstreamRequest(format!(
            "invalid price {:?} for {}",
            resp.price, resp.symbol
        )));
    }
    if normalize_symbol(&resp.symbol) != symbol {
        return Err(ExchangeError::UpstreamRequest(format!(
            "requested {} but got price for {}",
            symbol, resp.symbol
        )));
    }
    Ok(price)
}
