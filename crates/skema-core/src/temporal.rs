//! # Temporal Literal Coercion
//!
//! String-to-date and string-to-datetime are the explicit conversions a
//! literal property may apply before validation. Values are normalized so
//! that equal instants always compare (and serialize) equal:
//!
//! - `date`: `YYYY-MM-DD`. A full datetime is accepted and truncated.
//! - `date-time`: `YYYY-MM-DDTHH:MM:SSZ`, UTC, seconds precision. Offsets
//!   are converted to UTC; naive datetimes are assumed UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};

/// Normalize a date string to `YYYY-MM-DD`.
pub fn coerce_date(s: &str) -> Result<String, chrono::ParseError> {
    let s = s.trim();
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Ok(d.format("%Y-%m-%d").to_string()),
        Err(e) => match parse_datetime(s) {
            Ok(dt) => Ok(dt.date_naive().format("%Y-%m-%d").to_string()),
            Err(_) => Err(e),
        },
    }
}

/// Normalize a datetime string to RFC 3339 UTC with `Z` suffix.
pub fn coerce_datetime(s: &str) -> Result<String, chrono::ParseError> {
    let dt = parse_datetime(s.trim())?;
    Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let dt = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        {
            Ok(naive) => naive.and_utc(),
            Err(_) => return Err(e),
        },
    };
    Ok(dt.with_nanosecond(0).unwrap_or(dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_normalization() {
        assert_eq!(coerce_date("2024-02-29").unwrap(), "2024-02-29");
        assert_eq!(coerce_date("2024-02-29T23:10:00Z").unwrap(), "2024-02-29");
        assert!(coerce_date("2023-02-29").is_err());
        assert!(coerce_date("yesterday").is_err());
    }

    #[test]
    fn test_datetime_normalization() {
        assert_eq!(
            coerce_datetime("2024-01-15T17:00:00+05:00").unwrap(),
            "2024-01-15T12:00:00Z"
        );
        assert_eq!(
            coerce_datetime("2024-01-15T12:00:00.987Z").unwrap(),
            "2024-01-15T12:00:00Z"
        );
        assert_eq!(
            coerce_datetime("2024-01-15 12:00:00").unwrap(),
            "2024-01-15T12:00:00Z"
        );
        assert!(coerce_datetime("not a date").is_err());
    }
}
