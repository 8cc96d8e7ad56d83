use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Parses an ISO-8601 / RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Formats the way the service emits timestamps: UTC, millisecond precision, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts either a plain `YYYY-MM-DD` date or a full timestamp.
pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => parse_timestamp(raw).map(|ts| ts.date_naive()),
    }
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
