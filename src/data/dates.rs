//! Timestamp and date parsing for terminal exports and CLI arguments.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{AnalyzerError, Result};

const DATETIME_FORMATS: [&str; 7] = [
    "%Y.%m.%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%Y.%m.%d", "%Y/%m/%d"];

/// Parse a bar timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = parse_date(s) {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    Err(AnalyzerError::TimestampError(format!(
        "unrecognised timestamp '{}'",
        raw
    )))
}

/// Parse a calendar date, `YYYY-MM-DD` or day-first `DD.MM.YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| AnalyzerError::TimestampError(format!("unrecognised date '{}'", raw)))
}
