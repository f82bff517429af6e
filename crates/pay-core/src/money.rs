//! # Amounts
//!
//! Conversion between customer-facing decimal amounts and the integer minor
//! units (cents) the payment processor works in. All checkout amounts are USD.

use crate::error::{PaymentError, PaymentResult};

/// ISO 4217 code sent to the processor
pub const CURRENCY: &str = "usd";

/// Exclusive upper bound for a single checkout, in major units
pub const MAX_AMOUNT: f64 = 10_000.0;

const MINOR_PER_MAJOR: i64 = 100;

/// Parse and validate a checkout amount, returning minor units.
///
/// The amount must be a finite number with `0 < amount < 10000`. Plain
/// decimal text is rounded half-up at the cent boundary on its digits, so
/// `"49.995"` is exactly `5000`; other notations (`"1e2"`) go through `f64`.
pub fn parse_amount(input: &str) -> PaymentResult<i64> {
    let text = input.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| PaymentError::InvalidRequest("Amount must be a valid number".to_string()))?;

    if !value.is_finite() {
        return Err(PaymentError::InvalidRequest(
            "Amount must be a valid number".to_string(),
        ));
    }
    if value <= 0.0 {
        return Err(PaymentError::InvalidRequest(
            "Amount must be greater than 0".to_string(),
        ));
    }
    if value >= MAX_AMOUNT {
        return Err(PaymentError::InvalidRequest(format!(
            "Amount must be less than {}",
            MAX_AMOUNT
        )));
    }

    let minor = decimal_minor_units(text).unwrap_or_else(|| to_minor_units(value));
    if minor < 1 {
        return Err(PaymentError::InvalidRequest(
            "Amount must be at least 0.01".to_string(),
        ));
    }

    Ok(minor)
}

/// Convert a major-unit amount to minor units, rounding to the nearest cent.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * MINOR_PER_MAJOR as f64).round() as i64
}

/// Convert minor units back to a major-unit amount.
pub fn to_major_units(minor: i64) -> f64 {
    minor as f64 / MINOR_PER_MAJOR as f64
}

/// Format minor units as a two-decimal major amount (`2599` -> `"25.99"`).
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let per = MINOR_PER_MAJOR as u64;
    format!("{}{}.{:02}", sign, abs / per, abs % per)
}

/// Round-half-up on the digits of a non-negative plain decimal.
///
/// Returns `None` for anything that is not `[+]digits[.digits]`.
fn decimal_minor_units(text: &str) -> Option<i64> {
    let text = text.strip_prefix('+').unwrap_or(text);
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let digits: Vec<i64> = frac.bytes().map(|b| i64::from(b - b'0')).collect();
    let digit = |i: usize| digits.get(i).copied().unwrap_or(0);

    let mut minor = whole.checked_mul(MINOR_PER_MAJOR)? + digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        minor += 1;
    }
    Some(minor)
}
