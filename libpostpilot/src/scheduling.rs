//! Scheduling time utilities
//!
//! `scheduled_at` values are written by the authoring flow, so they arrive in
//! whatever shape the client sent. Everything is normalised to UTC here.

use crate::{PostpilotError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Naive layouts accepted when the value carries no offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a stored `scheduled_at` value into a UTC instant
///
/// Supports:
/// - RFC 3339 with an offset or `Z`: "2025-11-20T15:00:00+02:00"
/// - Timestamps without timezone information, read as UTC: "2025-11-20T15:00:00"
/// - Unix seconds: "1763650800"
///
/// # Errors
///
/// Returns `InvalidInput` if the value is empty or matches none of the formats.
pub fn parse_scheduled_at(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PostpilotError::InvalidInput(
            "Scheduled time cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(seconds) = input.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(seconds, 0) {
            return Ok(dt);
        }
    }

    Err(PostpilotError::InvalidInput(format!(
        "Could not parse scheduled time: {}",
        input
    )))
}

/// A post is due once its scheduled instant is at or before `now`
pub fn is_due(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    scheduled_at <= now
}

/// Canonical storage form for a scheduled instant
pub fn format_scheduled_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}
