use chrono::{NaiveDate, NaiveDateTime};

use crate::core::error::{Error, ErrorKind, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `yyyy-MM-dd HH:mm:ss` timestamp down to its date.
///
/// Fractional seconds (`.000000`) are dropped before parsing. Anything
/// unparseable yields `None` rather than a placeholder date, so a bad
/// timestamp can never land a record in the wrong place of a date order.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let whole = raw.split_once('.').map_or(raw, |(whole, _)| whole);
    NaiveDateTime::parse_from_str(whole, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.date())
}

/// Parse a query date. Accepts a bare `yyyy-MM-dd` or a full timestamp.
pub fn parse_query_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(date);
    }
    parse_timestamp(raw).ok_or_else(|| {
        Error::new(
            ErrorKind::UnparseableDate,
            format!("'{}' is not a yyyy-MM-dd date", raw),
        )
    })
}
