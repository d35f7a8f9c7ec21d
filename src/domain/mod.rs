//! Domain models for account holdings and their valuation.

mod balance;
mod credentials;
mod currency;

pub use balance::{BalanceSnapshot, IsolatedAsset, IsolatedPair, MarginAsset, SpotBalance};
pub use credentials::Credentials;
pub use currency::{DisplayCurrency, SETTLEMENT_ASSET, usdt_symbol};
