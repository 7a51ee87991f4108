/// Utility functions for timestamp formatting, label parsing and rounding
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::MonitorError;

/// Display label of a history point, e.g. `Jan 05 03:17 PM`
const LABEL_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day] [hour repr:12]:[minute] [period]");

const LABEL_PARSE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year] [month repr:short] [day] [hour repr:12]:[minute] [period]");

/// Older history files used a 24-hour clock in their labels
const LEGACY_LABEL_PARSE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year] [month repr:short] [day] [hour]:[minute]");

const LIVE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour repr:12]:[minute]:[second] [period]");

const NAIVE_ISO_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

const NAIVE_ISO_FRACTION_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

const LOG_FORMAT: &[FormatItem<'static>] =
    format_description!("[day].[month].[year] - [hour]:[minute]:[second]");

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(LOG_FORMAT).unwrap_or_else(|_| dt.to_string())
}

/// Format the label shown on the dashboard chart for a history point
pub fn format_label(dt: &OffsetDateTime) -> String {
    dt.format(LABEL_FORMAT).unwrap_or_else(|_| dt.to_string())
}

/// Format the timestamp of the live reading as the dashboard expects it
pub fn format_live_time(dt: &OffsetDateTime) -> String {
    dt.format(LIVE_TIME_FORMAT).unwrap_or_else(|_| dt.to_string())
}

/// Parse a chart label back into a timestamp
///
/// Labels carry no year, so the caller supplies one. Both the 12-hour
/// format and the older 24-hour format are accepted.
pub fn parse_label(label: &str, year: i32, offset: UtcOffset) -> Result<OffsetDateTime, MonitorError> {
    let with_year = format!("{} {}", year, label.trim());

    PrimitiveDateTime::parse(&with_year, LABEL_PARSE_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(&with_year, LEGACY_LABEL_PARSE_FORMAT))
        .map(|dt| dt.assume_offset(offset))
        .map_err(|_| MonitorError::MalformedHistoryLabel(label.to_string()))
}

/// Format an instant as RFC 3339 for persistence and the API
pub fn format_timestamp(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Parse a persisted instant
///
/// Accepts RFC 3339 and, for files written without an offset, a naive ISO
/// 8601 timestamp interpreted in `offset`.
pub fn parse_timestamp(value: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok().or_else(|| {
        PrimitiveDateTime::parse(value, NAIVE_ISO_FRACTION_FORMAT)
            .or_else(|_| PrimitiveDateTime::parse(value, NAIVE_ISO_FORMAT))
            .ok()
            .map(|dt| dt.assume_offset(offset))
    })
}

/// Convert a time::Duration to whole seconds, clamping negatives to zero
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds().max(0) as u64
}

/// Round to one decimal place
pub fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
