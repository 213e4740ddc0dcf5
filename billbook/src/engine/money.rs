//! Money and date formatting helpers
//!
//! All amounts are `Decimal`; floats only appear at the display edge.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept for every stored amount
pub const MONEY_SCALE: u32 = 2;

/// Round to cents, half away from zero. The result always carries two
/// fractional digits, so `259.2` is stored as `259.20`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Balance shown to the user. Overpayment is displayed as zero.
pub fn display_balance(balance: Decimal) -> Decimal {
    balance.max(Decimal::ZERO)
}

/// Lossy conversion for charts and other float-only consumers
pub fn to_display_f64(amount: Decimal) -> f64 {
    round_money(amount).to_f64().unwrap_or(0.0)
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

/// Format an amount for display, e.g. `$1,234.50` or `CHF 1,234.50`.
pub fn format_currency(amount: Decimal, currency_code: &str) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = format!("{:.2}", rounded.abs());

    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    let grouped = group_thousands(whole);

    let sign = if negative { "-" } else { "" };
    match currency_symbol(currency_code) {
        Some(symbol) => format!("{}{}{}.{}", sign, symbol, grouped, cents),
        None => format!("{}{} {}.{}", sign, currency_code.to_ascii_uppercase(), grouped, cents),
    }
}

fn group_thousands(whole: &str) -> String {
    let mut out = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format a date the way documents print it, e.g. `Jan 15, 2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}
