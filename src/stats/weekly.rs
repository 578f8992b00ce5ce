use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use log::debug;
use serde::Serialize;

use crate::alias::AliasResolver;
use crate::date_key::DateKey;
use crate::stats::tally::{sorted_desc, PlayerTally};
use crate::store::{RankingRecord, RankingStore, SpecialEventStore};

/// Positions 1-10 of a day's list
pub const TOP_BAND: Range<usize> = 0..10;
/// Positions 11-30 of a day's list
pub const BOTTOM_BAND: Range<usize> = 10..30;
/// A player must land in a band on at least this many days to be reported
pub const MIN_OCCURRENCES: u32 = 2;
pub const CUMULATIVE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub week: Vec<DateKey>,
    pub include_special_events: bool,
    pub top10_occurrences: BTreeMap<String, u32>,
    pub bottom20_occurrences: BTreeMap<String, u32>,
    pub cumulative_top5: BTreeMap<String, u64>,
}

impl WeeklyReport {
    pub fn top10_sorted(&self) -> Vec<(String, u32)> {
        sorted_desc(&self.top10_occurrences)
    }

    pub fn bottom20_sorted(&self) -> Vec<(String, u32)> {
        sorted_desc(&self.bottom20_occurrences)
    }

    pub fn cumulative_sorted(&self) -> Vec<(String, u64)> {
        sorted_desc(&self.cumulative_top5)
    }
}

/// Slices a rank-sorted day list, returning fewer rows on short days.
fn band(rows: &[RankingRecord], range: Range<usize>) -> &[RankingRecord] {
    let start = range.start.min(rows.len());
    let end = range.end.min(rows.len());
    &rows[start..end]
}

/// Keeps each player's lowest-rank row for one day.
fn best_rows<'r>(resolver: &AliasResolver, rows: &'r [RankingRecord]) -> Vec<&'r RankingRecord> {
    let mut best: HashMap<String, &RankingRecord> = HashMap::new();
    for row in rows {
        let key = resolver.canonical_key(&row.commander);
        match best.get(&key) {
            Some(existing) if existing.rank <= row.rank => {}
            _ => {
                best.insert(key, row);
            }
        }
    }
    let mut rows: Vec<&RankingRecord> = best.into_values().collect();
    rows.sort_by_key(|r| r.rank);
    rows
}

/// Computes the weekly tables from daily rankings, optionally folding in the
/// special events running on each day.
///
/// Daily data takes precedence: event rows only count for players without a
/// regular record on that date.
pub struct WeeklyAggregator<'a> {
    rankings: &'a RankingStore,
    resolver: &'a AliasResolver,
    events: Option<&'a SpecialEventStore>,
}

impl<'a> WeeklyAggregator<'a> {
    pub fn new(rankings: &'a RankingStore, resolver: &'a AliasResolver) -> Self {
        WeeklyAggregator {
            rankings,
            resolver,
            events: None,
        }
    }

    pub fn with_special_events(mut self, events: &'a SpecialEventStore) -> Self {
        self.events = Some(events);
        self
    }

    fn daily_players(&self, date: DateKey) -> HashSet<String> {
        self.rankings
            .for_date(date)
            .iter()
            .map(|r| self.resolver.canonical_key(&r.commander))
            .collect()
    }

    /// Ranking lists of the special events running on `date`.
    fn event_lists(&self, date: DateKey) -> Vec<&'a [RankingRecord]> {
        match self.events {
            Some(events) => events
                .on_date(date)
                .into_iter()
                .map(|event| self.rankings.for_event(&event.key))
                .filter(|rows| !rows.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    fn band_occurrences(&self, week: &[DateKey], range: Range<usize>) -> BTreeMap<String, u32> {
        let mut tally = PlayerTally::<u32>::default();
        for &date in week {
            // A player counts once per day however many rows they hold.
            let mut counted: HashSet<String> = HashSet::new();
            for row in band(self.rankings.for_date(date), range.clone()) {
                if counted.insert(self.resolver.canonical_key(&row.commander)) {
                    tally.add(self.resolver, &row.commander, 1);
                }
            }

            let event_lists = self.event_lists(date);
            if event_lists.is_empty() {
                continue;
            }
            let daily = self.daily_players(date);
            for rows in event_lists {
                for row in band(rows, range.clone()) {
                    let key = self.resolver.canonical_key(&row.commander);
                    if daily.contains(&key) {
                        continue;
                    }
                    if counted.insert(key) {
                        tally.add(self.resolver, &row.commander, 1);
                    }
                }
            }
        }
        tally.filter(|count| *count >= MIN_OCCURRENCES).into_map()
    }

    /// Players in the top 10 on two or more days of the week.
    pub fn top10_occurrences(&self, week: &[DateKey]) -> BTreeMap<String, u32> {
        self.band_occurrences(week, TOP_BAND)
    }

    /// Players at positions 11-30 on two or more days of the week.
    pub fn bottom20_occurrences(&self, week: &[DateKey]) -> BTreeMap<String, u32> {
        self.band_occurrences(week, BOTTOM_BAND)
    }

    /// Sum of each player's best daily row, truncated to the five highest totals.
    pub fn weekly_cumulative(&self, week: &[DateKey]) -> BTreeMap<String, u64> {
        let mut tally = PlayerTally::<u64>::default();
        for &date in week {
            for row in best_rows(self.resolver, self.rankings.for_date(date)) {
                tally.add(self.resolver, &row.commander, row.points);
            }

            let event_lists = self.event_lists(date);
            if event_lists.is_empty() {
                continue;
            }
            let daily = self.daily_players(date);
            for rows in event_lists {
                for row in best_rows(self.resolver, rows) {
                    if !daily.contains(&self.resolver.canonical_key(&row.commander)) {
                        tally.add(self.resolver, &row.commander, row.points);
                    }
                }
            }
        }

        let totals = tally.into_map();
        sorted_desc(&totals).into_iter().take(CUMULATIVE_LIMIT).collect()
    }

    pub fn report(&self, week: &[DateKey]) -> WeeklyReport {
        let report = WeeklyReport {
            week: week.to_vec(),
            include_special_events: self.events.is_some(),
            top10_occurrences: self.top10_occurrences(week),
            bottom20_occurrences: self.bottom20_occurrences(week),
            cumulative_top5: self.weekly_cumulative(week),
        };
        debug!(
            "weekly report from {:?}: {} top-10 repeaters, {} bottom-20 repeaters",
            week.first(),
            report.top10_occurrences.len(),
            report.bottom20_occurrences.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_key::DayRef;
    use crate::store::NewSpecialEvent;

    fn date(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn week() -> [DateKey; 7] {
        date("2025-01-06").week()
    }

    /// A day list of `count` filler players, with overrides at given ranks.
    fn day_rows(d: &str, count: u32, overrides: &[(u32, &str, u64)]) -> Vec<RankingRecord> {
        let day = DayRef::Calendar(date(d));
        (1..=count)
            .map(|rank| match overrides.iter().find(|(r, _, _)| *r == rank) {
                Some((_, name, points)) => RankingRecord::new(day.clone(), rank, name, *points),
                None => RankingRecord::new(day.clone(), rank, &format!("{d}-filler-{rank}"), 10),
            })
            .collect()
    }

    fn store(days: Vec<Vec<RankingRecord>>) -> RankingStore {
        RankingStore::from_records(days.into_iter().flatten().collect())
    }

    #[test]
    fn player_a_example_week() {
        let rankings = store(vec![
            day_rows("2025-01-06", 30, &[(3, "PlayerA", 1000)]),
            day_rows("2025-01-08", 30, &[(5, "PlayerA", 800)]),
        ]);
        let resolver = AliasResolver::default();
        let aggregator = WeeklyAggregator::new(&rankings, &resolver);

        let top10 = aggregator.top10_occurrences(&week());
        assert_eq!(top10, BTreeMap::from([("PlayerA".to_string(), 2)]));

        let cumulative = aggregator.weekly_cumulative(&week());
        assert_eq!(cumulative.get("PlayerA"), Some(&1800));
    }

    #[test]
    fn single_top10_appearance_is_filtered_out() {
        let rankings = store(vec![
            day_rows("2025-01-06", 12, &[(1, "Once", 50), (2, "Twice", 50)]),
            day_rows("2025-01-07", 12, &[(4, "Twice", 50), (11, "Once", 50)]),
        ]);
        let resolver = AliasResolver::default();
        let aggregator = WeeklyAggregator::new(&rankings, &resolver);
        let top10 = aggregator.top10_occurrences(&week());
        assert!(!top10.contains_key("Once"));
        assert_eq!(top10.get("Twice"), Some(&2));
    }

    #[test]
    fn bottom_band_is_positions_11_to_30() {
        let rankings = store(vec![
            day_rows("2025-01-06", 31, &[(11, "Low", 1), (31, "Outside", 1), (10, "Edge", 1)]),
            day_rows("2025-01-09", 31, &[(30, "Low", 1), (31, "Outside", 1), (10, "Edge", 1)]),
        ]);
        let resolver = AliasResolver::default();
        let bottom = WeeklyAggregator::new(&rankings, &resolver).bottom20_occurrences(&week());
        assert_eq!(bottom.get("Low"), Some(&2));
        assert!(!bottom.contains_key("Outside"));
        assert!(!bottom.contains_key("Edge"));
    }

    #[test]
    fn short_days_contribute_fewer_rows() {
        let rankings = store(vec![
            day_rows("2025-01-06", 3, &[(2, "Few", 1)]),
            day_rows("2025-01-07", 3, &[(3, "Few", 1)]),
        ]);
        let resolver = AliasResolver::default();
        let aggregator = WeeklyAggregator::new(&rankings, &resolver);
        assert_eq!(aggregator.top10_occurrences(&week()).get("Few"), Some(&2));
        assert!(aggregator.bottom20_occurrences(&week()).is_empty());
    }

    #[test]
    fn cumulative_uses_only_best_row_per_day() {
        let monday = DayRef::Calendar(date("2025-01-06"));
        let rankings = RankingStore::from_records(vec![
            RankingRecord::new(monday.clone(), 2, "Dup", 700),
            RankingRecord::new(monday.clone(), 6, "dup", 900),
            RankingRecord::new(monday, 1, "Other", 100),
        ]);
        let resolver = AliasResolver::default();
        let cumulative = WeeklyAggregator::new(&rankings, &resolver).weekly_cumulative(&week());
        assert_eq!(cumulative.get("Dup"), Some(&700));
    }

    #[test]
    fn cumulative_keeps_top_five() {
        let rankings = store(vec![day_rows(
            "2025-01-06",
            7,
            &[(1, "P1", 700), (2, "P2", 600), (3, "P3", 500), (4, "P4", 400), (5, "P5", 300), (6, "P6", 200), (7, "P7", 100)],
        )]);
        let resolver = AliasResolver::default();
        let cumulative = WeeklyAggregator::new(&rankings, &resolver).weekly_cumulative(&week());
        assert_eq!(cumulative.len(), 5);
        assert!(!cumulative.contains_key("P6"));
    }

    #[test]
    fn unparsable_points_count_as_zero() {
        let rows: Vec<RankingRecord> = serde_json::from_str(
            r#"[
                {"day": "2025-01-06", "rank": 1, "commander": "Z", "points": "garbage"},
                {"day": "2025-01-07", "rank": 1, "commander": "Z", "points": "1,500"}
            ]"#,
        )
        .unwrap();
        let rankings = RankingStore::from_records(rows);
        let resolver = AliasResolver::default();
        let cumulative = WeeklyAggregator::new(&rankings, &resolver).weekly_cumulative(&week());
        assert_eq!(cumulative.get("Z"), Some(&1500));
    }

    #[test]
    fn special_events_fold_in_only_for_players_without_daily_rows() {
        let mut events = SpecialEventStore::default();
        let event = events
            .create(NewSpecialEvent {
                name: "Bear Hunt".to_string(),
                start_date: date("2025-01-06"),
                end_date: date("2025-01-07"),
                weight: None,
                pinned: false,
            })
            .unwrap();

        let mut rankings = store(vec![
            day_rows("2025-01-06", 10, &[(1, "Daily", 100)]),
            day_rows("2025-01-07", 10, &[(1, "Daily", 100)]),
        ]);
        let event_day = DayRef::Event(event.key.clone());
        rankings.replace_day(
            event_day.clone(),
            vec![
                RankingRecord::new(event_day.clone(), 1, "EventOnly", 5000),
                RankingRecord::new(event_day, 2, "Daily", 5000),
            ],
        );

        let resolver = AliasResolver::default();
        let without = WeeklyAggregator::new(&rankings, &resolver);
        assert!(!without.top10_occurrences(&week()).contains_key("EventOnly"));
        assert_eq!(without.weekly_cumulative(&week()).get("Daily"), Some(&200));

        let with = WeeklyAggregator::new(&rankings, &resolver).with_special_events(&events);
        let top10 = with.top10_occurrences(&week());
        // The event runs two days, so it lands twice.
        assert_eq!(top10.get("EventOnly"), Some(&2));
        assert_eq!(top10.get("Daily"), Some(&2));

        let cumulative = with.weekly_cumulative(&week());
        assert_eq!(cumulative.get("EventOnly"), Some(&10000));
        assert_eq!(cumulative.get("Daily"), Some(&200));
    }

    #[test]
    fn huge_point_totals_saturate_instead_of_overflowing() {
        let rankings = store(vec![
            day_rows("2025-01-06", 3, &[(1, "Whale", u64::MAX)]),
            day_rows("2025-01-07", 3, &[(1, "Whale", u64::MAX)]),
        ]);
        let resolver = AliasResolver::default();
        let totals = WeeklyAggregator::new(&rankings, &resolver).weekly_cumulative(&week());
        assert_eq!(totals.get("Whale"), Some(&u64::MAX));
    }

    #[test]
    fn re_aggregation_is_identical() {
        let rankings = store(vec![
            day_rows("2025-01-06", 30, &[(3, "PlayerA", 1000)]),
            day_rows("2025-01-08", 30, &[(5, "PlayerA", 800)]),
            day_rows("2025-01-10", 30, &[]),
        ]);
        let resolver = AliasResolver::default();
        let aggregator = WeeklyAggregator::new(&rankings, &resolver);
        let first = serde_json::to_string(&aggregator.report(&week())).unwrap();
        let second = serde_json::to_string(&aggregator.report(&week())).unwrap();
        assert_eq!(first, second);
    }
}
