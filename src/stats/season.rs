use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::alias::{name_key, AliasResolver};
use crate::date_key::DateKey;
use crate::error::{Result, RosterError};
use crate::store::{
    KudosLedger, RankingRecord, RankingStore, SeasonKey, SeasonRankingRow, SeasonWeights,
    SpecialEvent, SpecialEventStore,
};

/// Event ranks are scored as if every event had this many participants.
pub const EVENT_PARTICIPANT_BASELINE: f64 = 50.0;
pub const KUDOS_SCALE: f64 = 10.0;
pub const VS_TOP_RANK: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonQuery {
    pub season_name: String,
    pub start_date: DateKey,
    pub end_date: DateKey,
    #[serde(default)]
    pub weights: SeasonWeights,
}

impl SeasonQuery {
    pub fn key(&self) -> SeasonKey {
        SeasonKey {
            season_name: self.season_name.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.season_name.trim().is_empty() {
            return RosterError::validation("season name is required");
        }
        if self.start_date > self.end_date {
            return RosterError::validation(format!(
                "season ends ({}) before it starts ({})",
                self.end_date, self.start_date
            ));
        }
        let w = &self.weights;
        for (label, value) in [("kudos", w.kudos), ("vs performance", w.vs_performance), ("special events", w.special_events)] {
            if !value.is_finite() || value < 0.0 {
                return RosterError::validation(format!("invalid {label} weight {value}"));
            }
        }
        Ok(())
    }
}

/// Who may appear on a season leaderboard: nobody on the removed list and no
/// active alliance leader. Built fresh for every generation.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
    excluded: HashSet<String>,
}

impl Eligibility {
    pub fn new<'n>(
        resolver: &AliasResolver,
        removed: impl IntoIterator<Item = &'n str>,
        active_leaders: impl IntoIterator<Item = &'n str>,
    ) -> Self {
        Eligibility {
            excluded: removed
                .into_iter()
                .chain(active_leaders)
                .map(|name| resolver.canonical_key(name))
                .collect(),
        }
    }

    pub fn is_eligible(&self, key: &str) -> bool {
        !self.excluded.contains(key)
    }
}

/// Percentage credit for an event placing; rank 1 earns 100, rank 50 earns 2.
pub fn event_rank_percentage(rank: u32) -> f64 {
    ((EVENT_PARTICIPANT_BASELINE - rank as f64 + 1.0) / EVENT_PARTICIPANT_BASELINE * 100.0).max(0.0)
}

pub struct SeasonScorer<'a> {
    rankings: &'a RankingStore,
    events: &'a SpecialEventStore,
    kudos: &'a KudosLedger,
    resolver: &'a AliasResolver,
}

impl<'a> SeasonScorer<'a> {
    pub fn new(
        rankings: &'a RankingStore,
        events: &'a SpecialEventStore,
        kudos: &'a KudosLedger,
        resolver: &'a AliasResolver,
    ) -> Self {
        SeasonScorer {
            rankings,
            events,
            kudos,
            resolver,
        }
    }

    /// Best (lowest) rank per player within one event.
    fn event_ranks(&self, event: &SpecialEvent) -> HashMap<String, u32> {
        let mut ranks: HashMap<String, u32> = HashMap::new();
        for row in self.rankings.for_event(&event.key) {
            let rank = ranks.entry(self.resolver.canonical_key(&row.commander)).or_insert(row.rank);
            *rank = (*rank).min(row.rank);
        }
        ranks
    }

    fn weighted_event_score(&self, events: &[(&SpecialEvent, HashMap<String, u32>)], key: &str) -> f64 {
        events
            .iter()
            .filter_map(|(event, ranks)| ranks.get(key).map(|rank| event_rank_percentage(*rank) * event.weight / 100.0))
            .sum()
    }

    fn candidates(&self, query: &SeasonQuery, events: &[&SpecialEvent]) -> BTreeMap<String, String> {
        let mut candidates = BTreeMap::new();
        let mut add = |name: &str| {
            let display = self.resolver.resolve(name);
            if !display.is_empty() {
                candidates.entry(name_key(&display)).or_insert(display);
            }
        };
        for date in self.rankings.recorded_dates(query.start_date, query.end_date) {
            self.rankings.for_date(date).iter().for_each(|r| add(&r.commander));
        }
        for event in events {
            self.rankings.for_event(&event.key).iter().for_each(|r| add(&r.commander));
        }
        for award in self.kudos.in_range(query.start_date, query.end_date) {
            add(&award.player_name);
        }
        candidates
    }

    pub fn score(&self, query: &SeasonQuery, eligibility: &Eligibility) -> Result<Vec<SeasonRankingRow>> {
        query.validate()?;
        let (start, end) = (query.start_date, query.end_date);

        let overlapping = self.events.overlapping(start, end);
        let (alliance, special): (Vec<&SpecialEvent>, Vec<&SpecialEvent>) =
            overlapping.iter().copied().partition(|e| e.is_alliance_contribution());
        let alliance: Vec<(&SpecialEvent, HashMap<String, u32>)> =
            alliance.into_iter().map(|e| (e, self.event_ranks(e))).collect();
        let special: Vec<(&SpecialEvent, HashMap<String, u32>)> =
            special.into_iter().map(|e| (e, self.event_ranks(e))).collect();

        // Every day with data counts toward the denominator, played or not.
        let recorded = self.rankings.recorded_dates(start, end);
        let top_by_day: Vec<HashSet<String>> = recorded
            .iter()
            .map(|date| {
                self.rankings
                    .for_date(*date)
                    .iter()
                    .filter(|r: &&RankingRecord| r.rank <= VS_TOP_RANK)
                    .map(|r| self.resolver.canonical_key(&r.commander))
                    .collect()
            })
            .collect();

        let weights = query.weights;
        let mut rows: Vec<SeasonRankingRow> = Vec::new();
        for (key, display) in self.candidates(query, &overlapping) {
            if !eligibility.is_eligible(&key) {
                debug!("{display} is not eligible for season {}", query.season_name);
                continue;
            }

            let kudos_score = self
                .kudos
                .latest_in_range(self.resolver, &display, start, end)
                .map(|award| award.value as f64 * KUDOS_SCALE)
                .unwrap_or(0.0);

            let vs_performance_score = if recorded.is_empty() {
                0.0
            } else {
                let top_days = top_by_day.iter().filter(|keys| keys.contains(&key)).count();
                top_days as f64 / recorded.len() as f64 * 100.0
            };

            let special_events_score = self.weighted_event_score(&special, &key);
            let alliance_contribution_score = self.weighted_event_score(&alliance, &key);

            // Alliance contribution is a bonus on top of the weighted categories.
            let total_weighted_score = kudos_score * weights.kudos / 100.0
                + vs_performance_score * weights.vs_performance / 100.0
                + special_events_score * weights.special_events / 100.0
                + alliance_contribution_score;

            rows.push(SeasonRankingRow {
                player_name: display,
                kudos_score,
                vs_performance_score,
                special_events_score,
                alliance_contribution_score,
                total_weighted_score,
                final_rank: 0,
            });
        }

        // Stable sort over name-ordered rows: equal totals stay alphabetical.
        rows.sort_by(|a, b| b.total_weighted_score.total_cmp(&a.total_weighted_score));
        for (i, row) in rows.iter_mut().enumerate() {
            row.final_rank = i as u32 + 1;
        }

        info!(
            "scored season '{}' ({} to {}): {} players over {} days and {} events",
            query.season_name,
            start,
            end,
            rows.len(),
            recorded.len(),
            overlapping.len()
        );
        Ok(rows)
    }
}
