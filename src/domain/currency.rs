//! Settlement and display currencies.

use serde::Deserialize;
use std::fmt;

/// Currency every holding is converted into for the total estimate.
pub const SETTLEMENT_ASSET: &str = "USDT";

/// Returns the USDT trading pair for an asset (e.g. "btc" -> "BTCUSDT").
pub fn usdt_symbol(asset: &str) -> String {
    format!("{}{}", asset.to_uppercase(), SETTLEMENT_ASSET)
}

/// Currency the status line shows the total in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayCurrency {
    #[default]
    Usdt,
    Btc,
    Eth,
    Bnb,
}

impl DisplayCurrency {
    /// Asset code of the currency.
    pub fn code(&self) -> &'static str {
        match self {
            DisplayCurrency::Usdt => "USDT",
            DisplayCurrency::Btc => "BTC",
            DisplayCurrency::Eth => "ETH",
            DisplayCurrency::Bnb => "BNB",
        }
    }

    /// Pair used to convert a USDT amount, or None for USDT itself.
    pub fn conversion_symbol(&self) -> Option<String> {
        match self {
            DisplayCurrency::Usdt => None,
            other => Some(usdt_symbol(other.code())),
        }
    }

    /// Decimal places shown on the status line.
    pub fn precision(&self) -> u32 {
        match self {
            DisplayCurrency::Usdt => 2,
            DisplayCurrency::Btc => 6,
            DisplayCurrency::Eth | DisplayCurrency::Bnb => 4,
        }
    }

    /// Prefix placed before the amount.
    pub fn sign(&self) -> &'static str {
        match self {
            DisplayCurrency::Usdt => "$",
            DisplayCurrency::Btc => "₿",
            DisplayCurrency::Eth => "Ξ",
            DisplayCurrency::Bnb => "BNB ",
        }
    }
}

impl fmt::Display for DisplayCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
