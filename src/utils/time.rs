//! Timestamp helpers.
//!
//! Every timestamp stored by memoria is a UTC RFC 3339 string with
//! microsecond precision and a `Z` suffix, so lexical order in SQL equals
//! chronological order.

use crate::types::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};

/// Format a UTC instant the way every store writes it.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time as a storage timestamp.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Now shifted by `delta`, or `InvalidInput` when that leaves chrono's range.
fn offset_from_now(delta: Option<TimeDelta>, amount: i64, unit: &str) -> Result<String> {
    delta
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .map(format_timestamp)
        .ok_or_else(|| AppError::InvalidInput(format!("{} {} is out of range", amount, unit)))
}

/// Storage timestamp `days` days before now.
pub fn days_ago(days: i64) -> Result<String> {
    offset_from_now(TimeDelta::try_days(days).map(|d| -d), days, "days")
}

/// Storage timestamp `minutes` minutes before now.
pub fn minutes_ago(minutes: i64) -> Result<String> {
    offset_from_now(TimeDelta::try_minutes(minutes).map(|d| -d), minutes, "minutes")
}

/// Storage timestamp `days` days after now.
pub fn days_ahead(days: i64) -> Result<String> {
    offset_from_now(TimeDelta::try_days(days), days, "days")
}

/// Today's date in UTC as `YYYY-MM-DD`.
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Parse a caller-supplied datetime and normalize it to a storage timestamp.
///
/// Accepts RFC 3339 (any offset), naive `YYYY-MM-DDTHH:MM[:SS]` or
/// `YYYY-MM-DD HH:MM[:SS]` (taken as UTC) and bare dates (midnight UTC).
pub fn parse_datetime(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::InvalidInput("datetime must not be empty".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(format_timestamp(dt.with_timezone(&Utc)));
    }

    const NAIVE_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(format_timestamp(Utc.from_utc_datetime(&naive)));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(format_timestamp(Utc.from_utc_datetime(&midnight)));
        }
    }

    Err(AppError::InvalidInput(format!(
        "Invalid datetime '{}': expected ISO 8601",
        input
    )))
}
