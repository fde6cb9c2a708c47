//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for status changes, heartbeats, and record bookkeeping.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// `at` moved back by `minutes`.
#[must_use]
pub fn minutes_before(at: Timestamp, minutes: u32) -> Timestamp {
    at - chrono::Duration::minutes(i64::from(minutes))
}

/// Parse an RFC 3339 string (the storage and wire format) into a UTC timestamp.
///
/// # Errors
///
/// Returns [`chrono::ParseError`] when `value` is not valid RFC 3339.
pub fn parse_rfc3339(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.to_utc())
}
