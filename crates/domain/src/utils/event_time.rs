//! Timestamp parsing for calendar event payloads
//!
//! Provider timestamps arrive as RFC 3339 strings; all-day events carry a
//! plain `YYYY-MM-DD` date resolved to UTC midnight.

use chrono::{DateTime, Utc};

use crate::errors::{AqademiqError, Result};

/// Parse an all-day date value (`YYYY-MM-DD`) to UTC midnight.
pub fn parse_all_day_date(value: &str, field: &str) -> Result<DateTime<Utc>> {
    let date = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        AqademiqError::Validation(format!("Invalid all-day {field} date '{value}': {e}"))
    })?;

    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        AqademiqError::Validation(format!(
            "Invalid all-day {field} date '{value}': could not derive midnight"
        ))
    })?;

    Ok(midnight.and_utc())
}

/// Parse an RFC 3339 event timestamp.
///
/// Values without an explicit timezone are treated as UTC; providers send
/// them for legacy recurring series.
pub fn parse_event_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AqademiqError::Validation(format!("Missing {field} timestamp")));
    }

    let has_explicit_timezone = trimmed.ends_with('Z')
        || trimmed
            .rfind('T')
            .is_some_and(|idx| trimmed[idx + 1..].chars().any(|c| matches!(c, '+' | '-')));

    let candidate = if has_explicit_timezone { trimmed.to_string() } else { format!("{trimmed}Z") };

    DateTime::parse_from_rfc3339(&candidate).map(|dt| dt.with_timezone(&Utc)).map_err(|e| {
        AqademiqError::Validation(format!("Invalid {field} timestamp '{value}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let ts = parse_event_timestamp("2025-03-01T09:30:00Z", "start").expect("parses");
        assert_eq!(ts.to_rfc3339(), "2025-03-01T09:30:00+00:00");
    }

    #[test]
    fn parses_offset_timestamp_to_utc() {
        let ts = parse_event_timestamp("2025-03-01T10:30:00+01:00", "start").expect("parses");
        assert_eq!(ts.to_rfc3339(), "2025-03-01T09:30:00+00:00");
    }

    #[test]
    fn assumes_utc_when_timezone_missing() {
        let ts = parse_event_timestamp("2025-03-01T09:30:00", "end").expect("parses");
        assert_eq!(ts.to_rfc3339(), "2025-03-01T09:30:00+00:00");
    }

    #[test]
    fn rejects_empty_timestamp() {
        let err = parse_event_timestamp("  ", "updated").expect_err("rejected");
        assert!(matches!(err, AqademiqError::Validation(_)));
    }

    #[test]
    fn parses_all_day_date_as_midnight() {
        let ts = parse_all_day_date("2025-03-01", "start").expect("parses");
        assert_eq!(ts.to_rfc3339(), "2025-03-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_garbage_all_day_date() {
        let err = parse_all_day_date("March 1st", "start").expect_err("rejected");
        assert!(matches!(err, AqademiqError::Validation(_)));
    }
}
