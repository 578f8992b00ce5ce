use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RosterError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// A calendar day, always written as `YYYY-MM-DD`.
///
/// Date keys carry no timezone: the string a user typed is the day that gets
/// stored, so there is no local-time shift when formatting back. Years are
/// limited to four digits so week arithmetic can never leave chrono's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        DateKey(date)
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .ok()
            .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
            .map(DateKey)
            .ok_or_else(|| RosterError::Validation(format!("invalid date key '{value}', expected YYYY-MM-DD")))
    }

    /// Whole days from `other` to `self` (negative when `self` is earlier).
    pub fn days_since(&self, other: DateKey) -> i64 {
        (self.0 - other.0).num_days()
    }

    pub fn add_days(&self, days: i64) -> DateKey {
        DateKey(self.0 + Duration::days(days))
    }

    pub fn monday_of_week(&self) -> DateKey {
        let offset = self.0.weekday().num_days_from_monday() as i64;
        self.add_days(-offset)
    }

    /// The seven days Monday..Sunday of the week containing this date.
    pub fn week(&self) -> [DateKey; 7] {
        let monday = self.monday_of_week();
        std::array::from_fn(|i| monday.add_days(i as i64))
    }

    pub fn is_within(&self, start: DateKey, end: DateKey) -> bool {
        start <= *self && *self <= end
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl TryFrom<String> for DateKey {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self> {
        DateKey::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(date: DateKey) -> String {
        date.to_string()
    }
}

impl FromStr for DateKey {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        DateKey::parse(s)
    }
}

/// What a ranking row is filed under: a calendar day or a special event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayRef {
    Calendar(DateKey),
    Event(String),
}

impl DayRef {
    pub fn as_calendar(&self) -> Option<DateKey> {
        match self {
            DayRef::Calendar(date) => Some(*date),
            DayRef::Event(_) => None,
        }
    }
}

impl fmt::Display for DayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayRef::Calendar(date) => write!(f, "{date}"),
            DayRef::Event(key) => write!(f, "{key}"),
        }
    }
}

// Anything shaped like YYYY-MM-DD is a calendar day; everything else is an event key.
impl TryFrom<String> for DayRef {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return RosterError::validation("day reference must not be empty");
        }
        match DateKey::parse(trimmed) {
            Ok(date) => Ok(DayRef::Calendar(date)),
            Err(_) => Ok(DayRef::Event(trimmed.to_string())),
        }
    }
}

impl From<DayRef> for String {
    fn from(day: DayRef) -> String {
        day.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    #[test]
    fn parses_and_formats_round_trip() {
        assert_eq!(key("2025-01-06").to_string(), "2025-01-06");
        assert_eq!(key(" 2025-01-06 ").to_string(), "2025-01-06");
        assert!(DateKey::parse("06/01/2025").is_err());
        assert!(DateKey::parse("2025-02-30").is_err());
    }

    #[test]
    fn rejects_years_outside_four_digits() {
        assert!(DateKey::parse("+262142-12-31").is_err());
        assert!(DateKey::parse("0000-01-01").is_err());
        assert!(serde_json::from_str::<DateKey>("\"+262142-12-31\"").is_err());
        assert_eq!(
            DayRef::try_from("+262142-12-31".to_string()).unwrap(),
            DayRef::Event("+262142-12-31".to_string())
        );

        let last = key("9999-12-31");
        assert_eq!(last.week()[0], key("9999-12-27"));
        assert_eq!(last.week()[6], last.add_days(2));
        let first = key("0001-01-01");
        assert!(first.week().contains(&first));
    }

    #[test]
    fn deserializes_from_plain_string() {
        let date: DateKey = serde_json::from_str("\"2025-01-06\"").unwrap();
        assert_eq!(date, key("2025-01-06"));
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2025-01-06\"");
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        let week = key("2025-01-09").week();
        assert_eq!(week[0], key("2025-01-06"));
        assert_eq!(week[6], key("2025-01-12"));
        assert_eq!(key("2025-01-12").monday_of_week(), key("2025-01-06"));
    }

    #[test]
    fn days_since_handles_both_directions() {
        let epoch = key("2024-01-01");
        assert_eq!(key("2024-01-11").days_since(epoch), 10);
        assert_eq!(key("2023-12-31").days_since(epoch), -1);
    }

    #[test]
    fn day_ref_distinguishes_dates_from_event_keys() {
        assert_eq!(DayRef::try_from("2025-01-06".to_string()).unwrap(), DayRef::Calendar(key("2025-01-06")));
        assert_eq!(
            DayRef::try_from("event_bear_hunt".to_string()).unwrap(),
            DayRef::Event("event_bear_hunt".to_string())
        );
        assert!(DayRef::try_from("  ".to_string()).is_err());
    }

    #[test]
    fn day_ref_serializes_as_plain_string() {
        let json = serde_json::to_string(&DayRef::Calendar(key("2025-01-06"))).unwrap();
        assert_eq!(json, "\"2025-01-06\"");
        let back: DayRef = serde_json::from_str("\"event_1\"").unwrap();
        assert_eq!(back, DayRef::Event("event_1".to_string()));
    }
}
