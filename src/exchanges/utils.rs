//! Common helpers for exchange responses.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parses a decimal string, treating unparsable values as zero.
pub fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value.trim())
        .or_else(|_| Decimal::from_scientific(value.trim()))
        .unwrap_or_default()
}

/// Normalizes a trading pair symbol to its canonical cache key.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_plain() {
        assert_eq!(parse_decimal("0.00150000"), dec!(0.0015));
        assert_eq!(parse_decimal("-50.00000000"), dec!(-50));
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("1E-8"), dec!(0.00000001));
    }

    #[test]
    fn test_parse_decimal_invalid_is_zero() {
        assert_eq!(parse_decimal("n/a"), Decimal::ZERO);
        assert_eq!(parse_decimal(""), Decimal::ZERO);
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btcusdt "), "BTCUSDT");
    }
}
