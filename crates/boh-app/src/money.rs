// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Ingredient costs are held as integer cents everywhere except the wire
//! format (`"2.35"`) and the local price editor (`f64` dollars).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    Invalid,
    Negative,
}

impl std::fmt::Display for MoneyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => f.write_str("invalid money value"),
            Self::Negative => f.write_str("negative money value"),
        }
    }
}

impl std::error::Error for MoneyError {}

pub fn parse_optional_cents(input: &str) -> Result<Option<i64>, MoneyError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_cents(trimmed).map(Some)
}

pub fn parse_cents(input: &str) -> Result<i64, MoneyError> {
    let clean = input.trim().replace(',', "");
    if clean.starts_with('-') {
        return Err(MoneyError::Negative);
    }
    let clean = clean.strip_prefix('$').unwrap_or(&clean);
    if clean.is_empty() {
        return Err(MoneyError::Invalid);
    }

    let (whole, frac) = match clean.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (clean, None),
    };
    let whole = parse_digits(whole, true)?;
    if whole > i64::MAX / 100 {
        return Err(MoneyError::Invalid);
    }

    let frac = match frac {
        None => 0,
        Some(frac) if frac.len() > 2 => return Err(MoneyError::Invalid),
        Some(frac) => {
            let value = parse_digits(frac, false)?;
            if frac.len() == 1 { value * 10 } else { value }
        }
    };

    whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac))
        .ok_or(MoneyError::Invalid)
}

/// `"2.35"`, the decimal form used on the wire.
pub fn cents_to_decimal(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// `"$1,204.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", comma_format(abs / 100), abs % 100)
}

pub fn format_dollars(value: f64) -> String {
    format!("${value:.2}")
}

pub fn dollars_to_cents(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let cents = (value * 100.0).round();
    if cents.abs() > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

fn parse_digits(input: &str, allow_empty: bool) -> Result<i64, MoneyError> {
    if input.is_empty() {
        return if allow_empty {
            Ok(0)
        } else {
            Err(MoneyError::Invalid)
        };
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(MoneyError::Invalid);
    }
    input.parse::<i64>().map_err(|_| MoneyError::Invalid)
}

fn comma_format(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        MoneyError, cents_to_decimal, dollars_to_cents, format_cents, parse_cents,
        parse_optional_cents,
    };

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(parse_cents("2.35"), Ok(235));
        assert_eq!(parse_cents("7.6"), Ok(760));
        assert_eq!(parse_cents("$1,204.50"), Ok(120_450));
        assert_eq!(parse_cents(".02"), Ok(2));
        assert_eq!(parse_cents("12"), Ok(1200));
    }

    #[test]
    fn rejects_malformed_money() {
        assert_eq!(parse_cents("-1.00"), Err(MoneyError::Negative));
        assert_eq!(parse_cents("1.234"), Err(MoneyError::Invalid));
        assert_eq!(parse_cents("1.2.3"), Err(MoneyError::Invalid));
        assert_eq!(parse_cents("abc"), Err(MoneyError::Invalid));
        assert_eq!(parse_cents("1."), Err(MoneyError::Invalid));
    }

    #[test]
    fn blank_optional_is_none() {
        assert_eq!(parse_optional_cents("  "), Ok(None));
        assert_eq!(parse_optional_cents("0.90"), Ok(Some(90)));
    }

    #[test]
    fn formats() {
        assert_eq!(cents_to_decimal(235), "2.35");
        assert_eq!(cents_to_decimal(2), "0.02");
        assert_eq!(format_cents(120_450), "$1,204.50");
        assert_eq!(format_cents(-5), "-$0.05");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
    }

    #[test]
    fn dollars_round_to_nearest_cent() {
        assert_eq!(dollars_to_cents(12.5), Some(1250));
        assert_eq!(dollars_to_cents(2.349), Some(235));
        assert_eq!(dollars_to_cents(f64::NAN), None);
    }
}
