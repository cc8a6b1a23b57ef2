use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Returns `true` if the provided string parses as a UUID.
pub fn is_valid_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// Returns `true` for two-letter alphabetic region codes (`IL`, `tx`).
pub fn is_valid_state_code(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parses a filter date given either as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are converted to UTC before the calendar date is taken.
pub fn parse_filter_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|ts| ts.with_timezone(&Utc).date_naive())
}

/// Case-insensitive membership test against a fixed vocabulary.
pub fn is_allowed(value: &str, allowed: &[&str]) -> bool {
    let needle = value.trim();
    allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(needle))
}
