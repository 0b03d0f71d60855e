use csv::StringRecord;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Record;
use crate::ingest::date::parse_timestamp;

/// Columns a row must carry, in order:
/// id, severity, start, end, street, city, county, state, temperature,
/// humidity, visibility, weather, crossing, day/night.
pub const COLUMNS: usize = 14;

/// Map one CSV row to a [`Record`].
///
/// Integer columns fail the row when malformed; timestamps never do, an
/// unparseable one becomes `None`. Extra trailing columns are ignored.
pub fn parse_row(row: &StringRecord) -> Result<Record> {
    if row.len() < COLUMNS {
        return Err(Error::new(
            ErrorKind::MalformedInput,
            format!("expected {} columns, found {}", COLUMNS, row.len()),
        ));
    }

    Ok(Record {
        id: row[0].to_string(),
        severity: parse_int(&row[1], "severity")?,
        start_time: parse_timestamp(&row[2]),
        end_time: parse_timestamp(&row[3]),
        street: row[4].to_string(),
        city: row[5].to_string(),
        county: row[6].to_string(),
        state: row[7].to_string(),
        temperature: parse_truncated(&row[8], "temperature")?,
        humidity: parse_truncated(&row[9], "humidity")?,
        visibility: parse_truncated(&row[10], "visibility")?,
        weather_condition: row[11].to_string(),
        crossing: row[12].trim().eq_ignore_ascii_case("true"),
        is_night: row[13].trim() == "Night",
    })
}

/// Parse a single CSV line, quoting rules included.
pub fn parse_line(line: &str) -> Result<Record> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut row = StringRecord::new();
    if !reader.read_record(&mut row)? {
        return Err(Error::new(ErrorKind::MalformedInput, "empty line".to_string()));
    }
    parse_row(&row)
}

/// 1-based source line a row starts on, 0 when the reader did not record it.
pub(crate) fn line_of(row: &StringRecord) -> usize {
    row.position().map_or(0, |pos| pos.line() as usize)
}

fn parse_int(field: &str, column: &str) -> Result<i32> {
    field.trim().parse::<i32>().map_err(|e| {
        Error::new(
            ErrorKind::MalformedInput,
            format!("{} '{}': {}", column, field, e),
        )
    })
}

/// Integer part of a decimal reading: `"36.9"` -> 36, `"-2.5"` -> -2.
fn parse_truncated(field: &str, column: &str) -> Result<i32> {
    let whole = field.split_once('.').map_or(field, |(whole, _)| whole);
    parse_int(whole, column)
}
