use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One accident report.
///
/// Records are plain values: the index takes ownership on insert and never
/// hands out mutable access, so a stored record cannot change its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub severity: i32,
    /// `None` when the source timestamp could not be parsed.
    pub start_time: Option<NaiveDate>,
    pub end_time: Option<NaiveDate>,
    pub street: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub temperature: i32,
    pub humidity: i32,
    pub visibility: i32,
    pub weather_condition: String,
    pub crossing: bool,
    pub is_night: bool,
}

impl Record {
    /// Minimal record carrying only the fields the index looks at.
    pub fn new(id: impl Into<String>, state: impl Into<String>, start_time: Option<NaiveDate>) -> Self {
        Record {
            id: id.into(),
            state: state.into(),
            start_time,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_dated(&self) -> bool {
        self.start_time.is_some()
    }

    /// True when the record started on or after `date`. Undated records
    /// never qualify.
    pub fn starts_on_or_after(&self, date: NaiveDate) -> bool {
        matches!(self.start_time, Some(start) if start >= date)
    }
}
