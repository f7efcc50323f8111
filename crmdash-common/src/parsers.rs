//! Locale-tolerant value parsers
//!
//! Monetary values arrive as numbers, `"R$ 1.234,56"`, `"1,234.56"` or
//! single-element arrays of either. Dates arrive as epoch numbers, ISO
//! strings, `YYYY/MM/DD` or Brazilian `DD/MM/YYYY`. Both parsers degrade to a
//! neutral value (0 / `None`) instead of failing: a bad field reduces one
//! record's contribution and never aborts a batch.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Epoch values below this are seconds, at or above it milliseconds.
const EPOCH_SECONDS_LIMIT: f64 = 10_000_000_000.0;

/// Unwrap the first element of a non-empty array (custom fields are often
/// delivered as `["value"]`).
fn first_element(value: &Value) -> &Value {
    match value {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}

/// Parse a monetary value, returning 0 for anything unusable.
///
/// # Examples
///
/// ```
/// use crmdash_common::parsers::parse_money;
/// use serde_json::json;
///
/// assert_eq!(parse_money(&json!("R$ 1.234,56")), 1234.56);
/// assert_eq!(parse_money(&json!("1,234.56")), 1234.56);
/// assert_eq!(parse_money(&json!("")), 0.0);
/// assert_eq!(parse_money(&json!(null)), 0.0);
/// ```
pub fn parse_money(value: &Value) -> f64 {
    let amount = match first_element(value) {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_money_str(s),
        _ => 0.0,
    };
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

fn parse_money_str(raw: &str) -> f64 {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !(*c == '$' || c.is_whitespace() || c.is_ascii_alphabetic()))
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    match (last_comma, last_dot) {
        // "1234,56": comma is the decimal mark
        (Some(_), None) => cleaned = cleaned.replacen(',', ".", 1),
        // "1.234,56" vs "1,234.56": the later separator is the decimal mark
        (Some(comma), Some(dot)) => {
            if comma > dot {
                cleaned = cleaned.replace('.', "").replacen(',', ".", 1);
            } else {
                cleaned = cleaned.replace(',', "");
            }
        }
        _ => {}
    }

    float_prefix(&cleaned).unwrap_or(0.0)
}

/// Parse the longest leading float literal (sign, digits, fraction, exponent).
fn float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }

    if mantissa_digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Parse a calendar date from an epoch number or a date string.
///
/// No timezone conversion is applied: the calendar date written in the
/// string is the date returned. Epoch values are read as UTC.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use crmdash_common::parsers::parse_date;
/// use serde_json::json;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
/// assert_eq!(parse_date(&json!("2024/03/15")), expected);
/// assert_eq!(parse_date(&json!("2024-03-15")), expected);
/// assert_eq!(parse_date(&json!("15/03/2024")), expected);
/// assert_eq!(parse_date(&json!("soon")), None);
/// ```
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    if let Value::Array(items) = value {
        if items.is_empty() {
            return None;
        }
    }
    match first_element(value) {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            if raw == 0.0 || !raw.is_finite() {
                return None;
            }
            let millis = if raw < EPOCH_SECONDS_LIMIT { raw * 1000.0 } else { raw };
            DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
        }
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let rewritten;
    let candidate = if has_slashed_iso_prefix(trimmed) {
        rewritten = trimmed.replace('/', "-");
        rewritten.as_str()
    } else {
        trimmed
    };

    if candidate.contains('-') {
        if let Some(date) = parse_iso_date(candidate) {
            return Some(date);
        }
    }

    parse_brazilian_prefix(candidate)
}

/// `YYYY/M/D` or `YYYY/MM/DD` at the start of the string.
fn has_slashed_iso_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 8 || !bytes[..4].iter().all(u8::is_ascii_digit) || bytes[4] != b'/' {
        return false;
    }
    let mut pos = 5;
    for part in 0..2 {
        let start = pos;
        while pos < bytes.len() && pos - start < 2 && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return false;
        }
        if part == 0 {
            if pos >= bytes.len() || bytes[pos] != b'/' {
                return false;
            }
            pos += 1;
        }
    }
    true
}

/// ISO calendar date, optionally followed by a time and offset.
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// `DD/MM/YYYY` at the start of the string.
fn parse_brazilian_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    let bytes = head.as_bytes();
    let digits_at = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if !(digits_at(0..2) && bytes[2] == b'/' && digits_at(3..5) && bytes[5] == b'/' && digits_at(6..10)) {
        return None;
    }
    let day: u32 = head[0..2].parse().ok()?;
    let month: u32 = head[3..5].parse().ok()?;
    let year: i32 = head[6..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_money_brazilian_format() {
        assert_eq!(parse_money(&json!("R$ 1.234,56")), 1234.56);
        assert_eq!(parse_money(&json!("R$\u{a0}2.500,00")), 2500.0);
        assert_eq!(parse_money(&json!("1500,5")), 1500.5);
    }

    #[test]
    fn test_money_us_format() {
        assert_eq!(parse_money(&json!("1,234.56")), 1234.56);
        assert_eq!(parse_money(&json!("$ 12,000,000.10")), 12_000_000.1);
    }

    #[test]
    fn test_money_plain_values() {
        assert_eq!(parse_money(&json!(3200)), 3200.0);
        assert_eq!(parse_money(&json!(99.9)), 99.9);
        assert_eq!(parse_money(&json!("5000")), 5000.0);
        assert_eq!(parse_money(&json!(["R$ 700,00"])), 700.0);
    }

    #[test]
    fn test_money_unusable_values_are_zero() {
        assert_eq!(parse_money(&json!("")), 0.0);
        assert_eq!(parse_money(&json!(null)), 0.0);
        assert_eq!(parse_money(&json!("a combinar")), 0.0);
        assert_eq!(parse_money(&json!([])), 0.0);
        assert_eq!(parse_money(&json!(true)), 0.0);
        assert_eq!(parse_money(&json!({"value": 10})), 0.0);
        assert_eq!(parse_money(&json!(-50)), 0.0);
        assert_eq!(parse_money(&json!("-50,00")), 0.0);
    }

    #[test]
    fn test_money_takes_leading_numeric_prefix() {
        // Two dots and no comma: only the first literal is used
        assert_eq!(parse_money(&json!("1.234.56")), 1.234);
        assert_eq!(parse_money(&json!("12#34")), 12.0);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date(&json!("2024/03/15")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("2024-03-15")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("15/03/2024")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("2024/3/5")), ymd(2024, 3, 5));
    }

    #[test]
    fn test_date_with_time_keeps_written_day() {
        assert_eq!(parse_date(&json!("2024-03-15T23:30:00-03:00")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("2024-03-15T01:00:00.000Z")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("2024-03-15 08:00:00")), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!("15/03/2024 10:45")), ymd(2024, 3, 15));
    }

    #[test]
    fn test_date_epochs() {
        // 2024-03-15T12:00:00Z
        assert_eq!(parse_date(&json!(1_710_504_000)), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!(1_710_504_000_000i64)), ymd(2024, 3, 15));
    }

    #[test]
    fn test_date_array_and_garbage() {
        assert_eq!(parse_date(&json!(["2024-03-15"])), ymd(2024, 3, 15));
        assert_eq!(parse_date(&json!([])), None);
        assert_eq!(parse_date(&json!(null)), None);
        assert_eq!(parse_date(&json!("")), None);
        assert_eq!(parse_date(&json!("amanhã")), None);
        assert_eq!(parse_date(&json!("15-03-2024")), None);
        assert_eq!(parse_date(&json!("31/02/2024")), None);
        assert_eq!(parse_date(&json!(0)), None);
    }
}
