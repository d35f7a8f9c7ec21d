//! Account holdings and the aggregated balance snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// One asset of the spot account.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl SpotBalance {
    /// Free plus locked quantity.
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    /// Returns true if neither free nor locked quantity is held.
    pub fn is_empty(&self) -> bool {
        self.free.is_zero() && self.locked.is_zero()
    }
}

/// One asset of the cross margin account.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginAsset {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
    pub borrowed: Decimal,
    pub interest: Decimal,
    /// Owner's exposure as reported by the exchange; negative when borrowed.
    pub net_asset: Decimal,
}

/// One side (base or quote) of an isolated margin pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolatedAsset {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
    pub borrowed: Decimal,
    pub interest: Decimal,
    pub net_asset: Decimal,
}

/// An isolated margin account scoped to one trading pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolatedPair {
    pub symbol: String,
    pub base: IsolatedAsset,
    pub quote: IsolatedAsset,
}

impl IsolatedPair {
    /// Returns true if neither side carries a net exposure.
    pub fn is_empty(&self) -> bool {
        self.base.net_asset.is_zero() && self.quote.net_asset.is_zero()
    }
}

/// Total account value in USDT, split by account type.
///
/// `total_usdt` is always the sum of the three parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub total_usdt: Decimal,
    pub spot_usdt: Decimal,
    pub margin_usdt: Decimal,
    pub isolated_margin_usdt: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Creates a snapshot stamped with the current time.
    pub fn new(spot_usdt: Decimal, margin_usdt: Decimal, isolated_margin_usdt: Decimal) -> Self {
        Self {
            total_usdt: spot_usdt
                .saturating_add(margin_usdt)
                .saturating_add(isolated_margin_usdt),
            spot_usdt,
            margin_usdt,
            isolated_margin_usdt,
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_total_saturates() {
        let snap = BalanceSnapshot::new(Decimal::MAX, dec!(1), dec!(0));
        assert_eq!(snap.total_usdt, Decimal::MAX);
        assert_eq!(snap.margin_usdt, dec!(1));
    }

    #[test]
    fn test_snapshot_total_is_sum_of_parts() {
        let snap = BalanceSnapshot::new(dec!(90000), dec!(-120.5), dec!(5950));
        assert_eq!(snap.total_usdt, dec!(95829.5));
        assert_eq!(
            snap.total_usdt,
            snap.spot_usdt + snap.margin_usdt + snap.isolated_margin_usdt
        );
    }

    #[test]
    fn test_spot_balance_total_and_empty() {
        let bal = SpotBalance {
            asset: "BTC".into(),
            free: dec!(1.5),
            locked: dec!(0.25),
        };
        assert_eq!(bal.total(), dec!(1.75));
        assert!(!bal.is_empty());

        let zero = SpotBalance {
            asset: "ETH".into(),
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
        };
        assert!(zero.is_empty());
    }
}
