// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and day keys.
//!
//! Day keys follow the device's local calendar, both for storage keys and for
//! matching rows read back from the remote log.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Timestamp layouts the spreadsheet may hand back after `USER_ENTERED` parsing.
const SHEET_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Timestamp written into appended log rows (millisecond precision, `Z`).
pub fn format_log_timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Day key (`YYYY-MM-DD`) for today in the local calendar.
pub fn today_key() -> String {
    day_key(Local::now().date_naive())
}

/// Day key for a calendar date.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

/// Parse a day key back into a date.
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()
}

/// Local-calendar day key of a timestamp cell from the remote log.
///
/// RFC3339 values are converted to local time; naive values are taken as
/// already local.
pub fn day_key_from_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(day_key(parsed.with_timezone(&Local).date_naive()));
    }

    SHEET_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| day_key(naive.date()))
        .or_else(|| parse_day_key(raw).map(day_key))
}

/// Whole calendar days from `day` to `today` (negative for future days).
pub fn days_between(day: NaiveDate, today: NaiveDate) -> i64 {
    (today - day).num_days()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
