use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::date_key::{DateKey, DayRef};
use crate::store::types::RankingRecord;

/// Ranking rows grouped by the day (or event) they were imported under
#[derive(Debug, Clone, Default)]
pub struct RankingStore {
    days: BTreeMap<DayRef, Vec<RankingRecord>>,
}

/// Resolves duplicate ranks within one day: the row with more points keeps
/// the slot. The result is sorted by rank ascending.
pub fn dedupe_by_rank(records: Vec<RankingRecord>) -> Vec<RankingRecord> {
    let mut by_rank: HashMap<u32, RankingRecord> = HashMap::new();
    for record in records {
        match by_rank.get(&record.rank) {
            Some(existing) if existing.points >= record.points => {}
            _ => {
                by_rank.insert(record.rank, record);
            }
        }
    }
    let mut result: Vec<RankingRecord> = by_rank.into_values().collect();
    result.sort_by_key(|r| r.rank);
    result
}

impl RankingStore {
    pub fn from_records(records: Vec<RankingRecord>) -> Self {
        let mut grouped: BTreeMap<DayRef, Vec<RankingRecord>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.day.clone()).or_default().push(record);
        }
        let mut store = RankingStore::default();
        for (day, rows) in grouped {
            store.replace_day(day, rows);
        }
        store
    }

    /// Replaces everything stored under `day` (delete-then-insert).
    /// Rows are re-filed under `day` and de-duplicated by rank.
    pub fn replace_day(&mut self, day: DayRef, records: Vec<RankingRecord>) -> usize {
        let rows: Vec<RankingRecord> = records
            .into_iter()
            .map(|mut r| {
                r.day = day.clone();
                r
            })
            .collect();
        let rows = dedupe_by_rank(rows);
        let count = rows.len();
        if rows.is_empty() {
            self.days.remove(&day);
        } else {
            self.days.insert(day, rows);
        }
        count
    }

    /// Removes a day's rows, returning how many were dropped
    pub fn clear_day(&mut self, day: &DayRef) -> usize {
        self.days.remove(day).map(|rows| rows.len()).unwrap_or(0)
    }

    /// Rows for one day, sorted by rank ascending.
    pub fn for_day(&self, day: &DayRef) -> &[RankingRecord] {
        self.days.get(day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_date(&self, date: DateKey) -> &[RankingRecord] {
        self.for_day(&DayRef::Calendar(date))
    }

    pub fn for_event(&self, key: &str) -> &[RankingRecord] {
        self.for_day(&DayRef::Event(key.to_string()))
    }

    pub fn has_day(&self, day: &DayRef) -> bool {
        self.days.contains_key(day)
    }

    pub fn all(&self) -> impl Iterator<Item = &RankingRecord> {
        self.days.values().flatten()
    }

    /// Calendar days within `[start, end]` that have any ranking data.
    pub fn recorded_dates(&self, start: DateKey, end: DateKey) -> BTreeSet<DateKey> {
        self.days
            .keys()
            .filter_map(DayRef::as_calendar)
            .filter(|date| date.is_within(start, end))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayRef {
        DayRef::try_from(s.to_string()).unwrap()
    }

    fn row(d: &str, rank: u32, name: &str, points: u64) -> RankingRecord {
        RankingRecord::new(day(d), rank, name, points)
    }

    #[test]
    fn duplicate_rank_keeps_higher_points() {
        let rows = dedupe_by_rank(vec![
            row("2025-01-06", 2, "Low", 100),
            row("2025-01-06", 1, "First", 900),
            row("2025-01-06", 2, "High", 500),
        ]);
        let names: Vec<&str> = rows.iter().map(|r| r.commander.as_str()).collect();
        assert_eq!(names, vec!["First", "High"]);
    }

    #[test]
    fn replace_day_is_delete_then_insert() {
        let mut store = RankingStore::default();
        store.replace_day(day("2025-01-06"), vec![row("2025-01-06", 1, "A", 10), row("2025-01-06", 2, "B", 5)]);
        store.replace_day(day("2025-01-06"), vec![row("2025-01-06", 1, "C", 7)]);
        let names: Vec<&str> = store.for_day(&day("2025-01-06")).iter().map(|r| r.commander.as_str()).collect();
        assert_eq!(names, vec!["C"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rows_are_refiled_under_the_target_day() {
        let mut store = RankingStore::default();
        store.replace_day(day("event_x"), vec![row("2025-01-06", 1, "A", 10)]);
        assert_eq!(store.for_event("event_x")[0].day, day("event_x"));
        assert!(store.for_day(&day("2025-01-06")).is_empty());
    }

    #[test]
    fn recorded_dates_skip_events_and_out_of_range_days() {
        let store = RankingStore::from_records(vec![
            row("2025-01-05", 1, "A", 1),
            row("2025-01-06", 1, "A", 1),
            row("2025-01-08", 1, "A", 1),
            row("event_x", 1, "A", 1),
        ]);
        let start = DateKey::parse("2025-01-06").unwrap();
        let end = DateKey::parse("2025-01-12").unwrap();
        let dates: Vec<String> = store.recorded_dates(start, end).iter().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2025-01-06", "2025-01-08"]);
    }

    #[test]
    fn clear_day_reports_removed_rows() {
        let mut store = RankingStore::from_records(vec![row("2025-01-06", 1, "A", 1), row("2025-01-06", 2, "B", 1)]);
        assert_eq!(store.clear_day(&day("2025-01-06")), 2);
        assert_eq!(store.clear_day(&day("2025-01-06")), 0);
        assert!(store.is_empty());
    }
}
