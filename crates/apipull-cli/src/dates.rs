//! Lenient date parsing for the `--start`/`--end` options
//!
//! Operators paste dates from dashboards and tickets in whatever shape
//! they come; the CLI should not insist on ISO 8601 T/Z punctuation.
//! Naive inputs are taken as UTC.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a date or datetime string into a UTC instant.
pub fn parse_flexible(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("date string is empty"));
    }

    // Offset-carrying forms first (2026-01-15T14:30:00Z, +02:00 variants).
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }
    }

    Err(anyhow!(
        "could not parse '{input}' as a date; accepted formats: \
         2026-01-15, 2026-01-15 14:30, 01/15/2026, 2026-01-15T14:30:00Z"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_accepts_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 15, 14, 30, 0).unwrap();
        for input in [
            "2026-01-15T14:30:00Z",
            "2026-01-15T14:30:00",
            "2026-01-15 14:30:00",
            "2026-01-15 14:30",
            "01/15/2026 14:30",
            "  2026-01-15T14:30  ",
        ] {
            assert_eq!(parse_flexible(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_flexible("2026-01-15").unwrap(), expected);
        assert_eq!(parse_flexible("01/15/2026").unwrap(), expected);
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let parsed = parse_flexible("2026-01-15T14:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_garbage_is_rejected_with_a_hint() {
        let error = parse_flexible("next tuesday").unwrap_err();
        assert!(error.to_string().contains("accepted formats"));
        assert!(parse_flexible("").is_err());
    }
}
