//! Parser for Go-style duration strings.
//!
//! The notifier reports snooze choices as strings like `"5m"`, `"1h30m"` or
//! `"1.5s"`. Supported units: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`.
//! A bare `"0"` is accepted; negative values are not. Like Go, the total must
//! fit in a signed 64-bit count of nanoseconds (about 292 years).

use crate::error::NotifyError;
use std::time::Duration;

/// Parse a Go-style duration string like `"90s"` or `"1h30m"`.
///
/// # Errors
///
/// Returns [`NotifyError::Parse`] for empty input, a missing or unknown unit,
/// a negative sign or a total above `i64::MAX` nanoseconds.
pub fn parse_go_duration(input: &str) -> Result<Duration, NotifyError> {
    let s = input.trim();
    let invalid = || NotifyError::Parse(format!("invalid duration {input:?}"));

    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        return Err(NotifyError::Parse(format!(
            "negative duration {input:?} is not allowed"
        )));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return Err(invalid()),
        };

        total_nanos = total_nanos
            .checked_add(scale(number, unit_nanos).ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        rest = tail;
    }

    if total_nanos > i64::MAX as u128 {
        return Err(NotifyError::Parse(format!(
            "duration {input:?} is out of range"
        )));
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    // Remainder is always below one second.
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Multiply a decimal number like `"1.5"` by a unit expressed in nanoseconds.
fn scale(number: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, frac) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.contains('.') {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    let mut divisor: u128 = 1;
    let mut frac_value: u128 = 0;
    for digit in frac.chars() {
        // Digits past nanosecond precision do not change the result.
        if divisor >= 1_000_000_000_000_000_000 {
            break;
        }
        frac_value = frac_value * 10 + u128::from(digit.to_digit(10)?);
        divisor *= 10;
    }
    nanos = nanos.checked_add(frac_value.checked_mul(unit_nanos)? / divisor)?;
    Some(nanos)
}
