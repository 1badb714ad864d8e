//! # Relative Durations
//!
//! Parses the `expires_in` shorthand: `<integer><unit>` where unit is one of
//! `ms`, `s`, `m`, `h`, `d`, `w`, `y` (long forms such as `"1 day"` or
//! `"2 hours"` are accepted too), or a bare integer meaning milliseconds.
//! Units are case-insensitive. A year is 365.25 days.

use super::errors::ValidationError;
use chrono::Duration;

/// Default token lifetime when neither an expiration time nor a relative
/// duration is supplied.
pub const DEFAULT_EXPIRES_IN: &str = "1d";

/// Longest input accepted; anything longer is rejected unparsed.
const MAX_INPUT_LEN: usize = 100;

/// Parse a relative duration string.
///
/// ```
/// use web3_token::domain::duration::parse_duration;
///
/// assert_eq!(parse_duration("1d").unwrap().num_milliseconds(), 86_400_000);
/// assert_eq!(parse_duration("250").unwrap().num_milliseconds(), 250);
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidDuration(input.to_string());

    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_INPUT_LEN {
        return Err(invalid());
    }

    // Bare integer: milliseconds
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = trimmed.parse().map_err(|_| invalid())?;
        return Duration::try_milliseconds(millis).ok_or_else(invalid);
    }

    let normalized = normalize(trimmed);
    // Whole numbers only: no signs or decimal points.
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_alphabetic() || c == ' ')
    {
        return Err(invalid());
    }
    let parsed = humantime::parse_duration(&normalized).map_err(|_| invalid())?;

    Duration::from_std(parsed).map_err(|_| invalid())
}

/// Lowercase the input and drop whitespace between a number and its unit,
/// so `"1 Day"` reads as `"1day"`.
fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            let after_digit = out.chars().last().is_some_and(|p| p.is_ascii_digit());
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            let before_unit = chars.peek().is_some_and(|n| n.is_ascii_alphabetic());
            if !(after_digit && before_unit) {
                out.push(' ');
            }
            continue;
        }
        out.extend(c.to_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECOND: i64 = 1_000;
    const MINUTE: i64 = 60 * SECOND;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    fn millis(input: &str) -> i64 {
        parse_duration(input).unwrap().num_milliseconds()
    }

    #[test]
    fn test_default_is_exactly_one_day() {
        assert_eq!(millis(DEFAULT_EXPIRES_IN), 86_400_000);
    }

    #[test]
    fn test_short_units() {
        assert_eq!(millis("1ms"), 1);
        assert_eq!(millis("30s"), 30 * SECOND);
        assert_eq!(millis("5m"), 5 * MINUTE);
        assert_eq!(millis("2h"), 2 * HOUR);
        assert_eq!(millis("7d"), 7 * DAY);
        assert_eq!(millis("1w"), 7 * DAY);
        assert_eq!(millis("1y"), 36_525 * DAY / 100);
    }

    #[test]
    fn test_bare_integer_is_milliseconds() {
        assert_eq!(millis("100"), 100);
        assert_eq!(millis("0"), 0);
    }

    #[test]
    fn test_long_forms_and_spacing() {
        assert_eq!(millis("1 day"), DAY);
        assert_eq!(millis("2 hours"), 2 * HOUR);
        assert_eq!(millis("  3  minutes "), 3 * MINUTE);
        assert_eq!(millis("1D"), DAY);
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["", "   ", "d", "1x", "one day", "-1d", "1.5h", "1d!"] {
            assert!(
                matches!(
                    parse_duration(input),
                    Err(ValidationError::InvalidDuration(_))
                ),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_rejects_fractional_and_signed_amounts() {
        for input in ["1.5h", "0.5d", "2h 1.5m", "+1d", "1,5h", "1_000ms"] {
            assert_eq!(
                parse_duration(input),
                Err(ValidationError::InvalidDuration(input.to_string())),
                "accepted {input:?}"
            );
        }
        assert_eq!(millis("1h 30m"), HOUR + 30 * MINUTE);
    }

    #[test]
    fn test_rejects_oversized_input() {
        let input = "1".repeat(MAX_INPUT_LEN + 1);
        assert!(parse_duration(&input).is_err());
    }

    proptest! {
        #[test]
        fn prop_seconds_scale_exactly(n in 0u32..1_000_000) {
            prop_assert_eq!(millis(&format!("{n}s")), i64::from(n) * SECOND);
        }

        #[test]
        fn prop_bare_integers_round_trip(n in 0u32..u32::MAX) {
            prop_assert_eq!(millis(&n.to_string()), i64::from(n));
        }
    }
}
