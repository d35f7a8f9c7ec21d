//! Status line text.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::{BalanceSnapshot, DisplayCurrency};

/// Icon placed before the status text.
const STATUS_ICON: &str = "💰";

/// Formats an amount in `currency` with its sign and precision (e.g. "-$1,234.50").
pub fn format_money(amount: Decimal, currency: DisplayCurrency) -> String {
    let precision = currency.precision();
    let rounded = amount.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();

    let digits = format!("{:.*}", precision as usize, rounded.abs());
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits.as_str(), None),
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(currency.sign());
    out.push_str(&add_thousand_separators(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Status text for a converted total.
pub fn format_status_text(amount: Decimal, currency: DisplayCurrency, show_icon: bool) -> String {
    with_icon(&format_money(amount, currency), show_icon)
}

/// Per-account breakdown shown on hover.
pub fn format_tooltip(snapshot: &BalanceSnapshot) -> String {
    let usdt = DisplayCurrency::Usdt;
    format!(
        "Binance balance\n\n\
         Spot: {}\n\
         Cross margin: {}\n\
         Isolated margin: {}\n\n\
         Total: {}\n\n\
         ⏰ {}",
        format_money(snapshot.spot_usdt, usdt),
        format_money(snapshot.margin_usdt, usdt),
        format_money(snapshot.isolated_margin_usdt, usdt),
        format_money(snapshot.total_usdt, usdt),
        snapshot.computed_at.format("%H:%M:%S UTC")
    )
}

pub fn format_loading(show_icon: bool) -> String {
    with_icon("Loading...", show_icon)
}

pub fn format_not_configured(show_icon: bool) -> String {
    with_icon("Binance: API key not set", show_icon)
}

pub fn format_error(show_icon: bool) -> String {
    with_icon("Balance unavailable", show_icon)
}

fn with_icon(text: &str, show_icon: bool) -> String {
    if show_icon {
        format!("{} {}", STATUS_ICON, text)
    } else {
        text.to_string()
    }
}

/// Inserts thousands separators into a string of digits.
pub(super) fn add_thousand_separators(digits: &str) -> String {
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
