//! ISO-8601 timestamp handling and one-minute bucketing.
//!
//! Producers send timestamps in whatever ISO-8601 shape their runtime emits:
//! `2024-01-01T00:00:30Z`, `2024-01-01 00:00:30.123+02:00`, or a bare
//! `2024-01-01T00:00:30` with no offset at all. Everything is normalized to
//! UTC; values without an offset are taken to already be UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::ValidationError;

/// Shapes that carry an explicit offset (tried after RFC 3339).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Shapes without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp and normalize it to UTC.
///
/// A trailing `Z` is shorthand for `+00:00`. Date-only input resolves to
/// midnight UTC.
///
/// # Example
/// ```
/// use casemon_core::timestamp::{parse_timestamp, format_timestamp};
///
/// let ts = parse_timestamp("2024-01-01T02:00:30+02:00").unwrap();
/// assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:30+00:00");
/// ```
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let normalized = match input.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => input.to_owned(),
    };

    parse_with_offset(&normalized)
        .or_else(|| parse_naive(&normalized))
        .ok_or_else(|| ValidationError::invalid_timestamp(input))
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::<FixedOffset>::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<DateTime<Utc>> {
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(naive.and_utc())
}

/// Truncate to the start of the enclosing minute (the anomaly-view join key).
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Render a UTC timestamp as RFC 3339 with an explicit `+00:00` offset.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
