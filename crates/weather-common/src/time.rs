//! Timestamp parsing for feed-provided times.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Offset applied to feed timestamps that carry no zone (UTC+8).
pub const FEED_LOCAL_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

/// Parse a timestamp as the upstream feed writes it.
///
/// Accepts RFC 3339 (`2024-01-15T12:00:00+08:00`) and zone-less
/// `2024-01-15T12:00:00` / `2024-01-15 12:00:00`, the latter two read in
/// the feed's local offset.
pub fn parse_feed_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let offset = FixedOffset::east_opt(FEED_LOCAL_OFFSET_SECS)
        .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            if let Some(dt) = offset.from_local_datetime(&ndt).single() {
                return Ok(dt.with_timezone(&Utc));
            }
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}
