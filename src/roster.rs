use std::collections::BTreeSet;

use log::{info, warn};
use serde::Serialize;

use crate::alias::AliasResolver;
use crate::date_key::{DateKey, DayRef};
use crate::error::{Result, RosterError};
use crate::rotation::{LeaderRemoval, LeaderRoster, RotationEngine};
use crate::stats::{Eligibility, SeasonQuery, SeasonScorer, WeeklyAggregator, WeeklyReport};
use crate::store::{
    AllianceLeader, KudosAward, KudosLedger, MemoryBackend, NewSpecialEvent, PlayerAlias, RankingRecord,
    RankingStore, RemovedPlayer, RemovedPlayers, RosterBackend, RosterSnapshot, RotationEntry, SeasonKey,
    SeasonSnapshot, SeasonSnapshots, SpecialEvent, SpecialEventPatch, SpecialEventStore, VipLedger, VipSelection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// Reads and writes go to the configured backend.
    Primary,
    /// The caller switched to an in-memory copy; nothing reaches the backend.
    Offline,
}

/// All roster state held in memory
#[derive(Debug, Clone, Default)]
pub struct RosterData {
    pub rankings: RankingStore,
    pub events: SpecialEventStore,
    pub leaders: LeaderRoster,
    pub rotation: RotationEngine,
    pub vip: VipLedger,
    pub aliases: AliasResolver,
    pub kudos: KudosLedger,
    pub removed: RemovedPlayers,
    pub seasons: SeasonSnapshots,
}

impl RosterData {
    pub fn from_snapshot(snapshot: RosterSnapshot) -> Self {
        RosterData {
            rankings: RankingStore::from_records(snapshot.rankings),
            events: SpecialEventStore::from_events(snapshot.special_events),
            leaders: LeaderRoster::from_leaders(snapshot.alliance_leaders),
            rotation: RotationEngine::from_entries(snapshot.rotation),
            vip: VipLedger::from_selections(snapshot.vip_selections),
            aliases: AliasResolver::new(snapshot.aliases),
            kudos: KudosLedger::from_awards(snapshot.kudos),
            removed: RemovedPlayers::from_players(snapshot.removed_players),
            seasons: SeasonSnapshots::from_snapshots(snapshot.seasons),
        }
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            rankings: self.rankings.all().cloned().collect(),
            special_events: self.events.all().cloned().collect(),
            alliance_leaders: self.leaders.list().to_vec(),
            rotation: self.rotation.entries().to_vec(),
            vip_selections: self.vip.all().cloned().collect(),
            aliases: self.aliases.aliases().to_vec(),
            kudos: self.kudos.all().cloned().collect(),
            removed_players: self.removed.all().cloned().collect(),
            seasons: self.seasons.all().cloned().collect(),
        }
    }
}

/// The roster service: in-memory state plus the backend it is saved to.
///
/// Every mutation runs against a copy of the state, the copy is saved, and
/// only then does it replace the live state. A failed save leaves readers
/// looking at the previous state.
pub struct Roster {
    data: RosterData,
    backend: Box<dyn RosterBackend>,
    mode: StoreMode,
}

impl Roster {
    pub fn open(backend: Box<dyn RosterBackend>) -> Result<Self> {
        let snapshot = backend.load()?.unwrap_or_default();
        let data = RosterData::from_snapshot(snapshot);
        info!(
            "opened roster from {}: {} ranking rows, {} events, {} leaders",
            backend.describe(),
            data.rankings.len(),
            data.events.all().count(),
            data.leaders.list().len()
        );
        Ok(Roster {
            data,
            backend,
            mode: StoreMode::Primary,
        })
    }

    pub fn in_memory() -> Self {
        Roster {
            data: RosterData::default(),
            backend: Box::new(MemoryBackend::default()),
            mode: StoreMode::Primary,
        }
    }

    /// Switches to an in-memory copy of the current state. Later changes are
    /// kept only for this process.
    pub fn engage_offline(&mut self) {
        warn!("roster switching to offline mode; changes will not reach {}", self.backend.describe());
        self.backend = Box::new(MemoryBackend::with_snapshot(self.data.snapshot()));
        self.mode = StoreMode::Offline;
    }

    /// Opens `backend`, or an empty offline roster when it cannot be read
    /// and `allow_offline` is set.
    pub fn open_or_offline(backend: Box<dyn RosterBackend>, allow_offline: bool) -> Result<Self> {
        let description = backend.describe();
        match Roster::open(backend) {
            Err(RosterError::BackingStoreUnavailable(reason)) if allow_offline => {
                warn!("{description} unavailable ({reason}); starting offline");
                let mut roster = Roster::in_memory();
                roster.mode = StoreMode::Offline;
                Ok(roster)
            }
            other => other,
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }

    pub fn data(&self) -> &RosterData {
        &self.data
    }

    /// Discards in-memory state and reloads it from the backend.
    pub fn refresh(&mut self) -> Result<()> {
        let snapshot = self.backend.load()?.unwrap_or_default();
        self.data = RosterData::from_snapshot(snapshot);
        Ok(())
    }

    pub fn refresh_aliases(&mut self) -> Result<()> {
        let aliases = self.backend.load()?.unwrap_or_default().aliases;
        self.data.aliases.refresh(aliases);
        Ok(())
    }

    fn mutate<T>(&mut self, change: impl FnOnce(&mut RosterData) -> Result<T>) -> Result<T> {
        let mut next = self.data.clone();
        let value = change(&mut next)?;
        self.backend.save(&next.snapshot())?;
        self.data = next;
        Ok(value)
    }

    // Rankings

    /// Replaces everything stored for `day` with `records`.
    pub fn import_rankings(&mut self, day: DayRef, records: Vec<RankingRecord>) -> Result<usize> {
        if let DayRef::Event(key) = &day {
            if self.data.events.get(key).is_none() {
                return RosterError::not_found(format!("special event {key}"));
            }
        }
        let count = self.mutate(|data| Ok(data.rankings.replace_day(day.clone(), records)))?;
        info!("imported {count} ranking rows for {day}");
        Ok(count)
    }

    pub fn clear_day(&mut self, day: &DayRef) -> Result<usize> {
        if !self.data.rankings.has_day(day) {
            return RosterError::not_found(format!("rankings for {day}"));
        }
        let count = self.mutate(|data| Ok(data.rankings.clear_day(day)))?;
        info!("cleared {count} ranking rows for {day}");
        Ok(count)
    }

    // Special events

    pub fn create_event(&mut self, new_event: NewSpecialEvent) -> Result<SpecialEvent> {
        let event = self.mutate(|data| data.events.create(new_event))?;
        info!("created special event {} ({})", event.name, event.key);
        Ok(event)
    }

    pub fn update_event(&mut self, key: &str, patch: SpecialEventPatch) -> Result<SpecialEvent> {
        self.mutate(|data| data.events.update(key, patch))
    }

    /// Deletes the event and every ranking row filed under it.
    pub fn delete_event(&mut self, key: &str) -> Result<(SpecialEvent, usize)> {
        let (event, rows) = self.mutate(|data| {
            let event = data.events.delete(key)?;
            let rows = data.rankings.clear_day(&DayRef::Event(event.key.clone()));
            Ok((event, rows))
        })?;
        info!("deleted special event {} and {rows} ranking rows", event.key);
        Ok((event, rows))
    }

    // Leaders and rotation

    pub fn add_leader(&mut self, name: &str) -> Result<AllianceLeader> {
        self.mutate(|data| data.leaders.add(name, &mut data.rotation))
    }

    /// Removes a leader. Returns `ConflictWithHistory` (after saving the soft
    /// delete) when the leader has conducted trains.
    pub fn remove_leader(&mut self, name: &str) -> Result<()> {
        let outcome = self.mutate(|data| {
            data.leaders
                .remove(name, &mut data.rotation, &data.vip, &data.aliases)
        })?;
        match outcome {
            LeaderRemoval::Removed => Ok(()),
            LeaderRemoval::SoftDeletedDueToHistory => Err(RosterError::ConflictWithHistory {
                player: name.trim().to_string(),
            }),
        }
    }

    pub fn current_conductor(&self, date: DateKey) -> Option<&RotationEntry> {
        self.data.rotation.current_conductor(date)
    }

    pub fn next_leader_due(&self) -> Option<&RotationEntry> {
        self.data.rotation.next_leader_due()
    }

    pub fn rotation(&self) -> Vec<&RotationEntry> {
        self.data.rotation.active()
    }

    pub fn advance_rotation(&mut self) -> Result<()> {
        self.mutate(|data| data.rotation.advance())?;
        if let Some(next) = self.next_leader_due() {
            info!("rotation advanced; {} is next", next.player_name);
        }
        Ok(())
    }

    pub fn move_up(&mut self, index: usize) -> Result<()> {
        self.mutate(|data| data.rotation.move_up(index))
    }

    pub fn move_down(&mut self, index: usize) -> Result<()> {
        self.mutate(|data| data.rotation.move_down(index))
    }

    pub fn remove_from_rotation(&mut self, index: usize) -> Result<RotationEntry> {
        self.mutate(|data| data.rotation.remove(index))
    }

    pub fn reorder_rotation(&mut self, ordered: &[String]) -> Result<()> {
        self.mutate(|data| data.rotation.reorder_full(ordered))
    }

    // VIP trains

    pub fn set_vip_for_date(&mut self, selection: VipSelection) -> Result<VipSelection> {
        let saved = self.mutate(|data| data.vip.set_vip_for_date(selection))?;
        info!(
            "VIP for {} {}: {} (conductor {})",
            saved.date, saved.train_time, saved.vip_player, saved.conductor
        );
        Ok(saved)
    }

    /// Records a train run by the conductor at the front of the line and
    /// advances the rotation in the same save.
    pub fn confirm_train(&mut self, selection: VipSelection) -> Result<VipSelection> {
        self.mutate(|data| {
            let due = data
                .rotation
                .next_leader_due()
                .map(|e| data.aliases.canonical_key(&e.player_name))
                .ok_or_else(|| RosterError::NotFound("rotation entries".to_string()))?;
            if data.aliases.canonical_key(&selection.conductor) != due {
                return RosterError::validation(format!("{} is not the next conductor due", selection.conductor.trim()));
            }
            let saved = data.vip.set_vip_for_date(selection)?;
            data.rotation.advance()?;
            Ok(saved)
        })
    }

    pub fn delete_vip(&mut self, date: DateKey, train_time: &str) -> Result<VipSelection> {
        self.mutate(|data| data.vip.delete(date, train_time))
    }

    pub fn delete_vips_for_date(&mut self, date: DateKey) -> Result<usize> {
        self.mutate(|data| Ok(data.vip.delete_for_date(date)))
    }

    // Players

    pub fn award_kudos(&mut self, player: &str, date: DateKey, value: u8) -> Result<KudosAward> {
        self.mutate(|data| data.kudos.award(player, date, value))
    }

    pub fn remove_player(&mut self, player: &str, removed_on: DateKey, reason: &str) -> Result<RemovedPlayer> {
        self.mutate(|data| data.removed.remove(player, removed_on, reason))
    }

    pub fn restore_player(&mut self, player: &str) -> Result<RemovedPlayer> {
        self.mutate(|data| data.removed.restore(player))
    }

    pub fn add_alias(&mut self, primary: &str, alias: &str, created_by: &str) -> Result<PlayerAlias> {
        self.mutate(|data| data.aliases.add(primary, alias, created_by))
    }

    pub fn deactivate_alias(&mut self, alias: &str) -> Result<()> {
        self.mutate(|data| data.aliases.deactivate(alias))
    }

    /// Distinct primary names of ranked players matching `query` directly or
    /// through an alias.
    pub fn search_players(&self, query: &str) -> Vec<String> {
        let resolver = &self.data.aliases;
        let names: BTreeSet<String> = self
            .data
            .rankings
            .all()
            .map(|r| resolver.resolve(&r.commander))
            .chain(resolver.aliases().iter().filter(|a| a.is_active).map(|a| a.primary_name.clone()))
            .filter(|name| resolver.matches(query, name))
            .collect();
        names.into_iter().collect()
    }

    // Reports

    /// Weekly tables for the Monday-to-Sunday week containing `day`.
    pub fn weekly_report(&self, day: DateKey, include_special_events: bool) -> WeeklyReport {
        if self.data.rankings.is_empty() {
            warn!("no rankings imported yet; the weekly report for {day} will be empty");
        }
        let week = day.week();
        let aggregator = WeeklyAggregator::new(&self.data.rankings, &self.data.aliases);
        if include_special_events {
            aggregator.with_special_events(&self.data.events).report(&week)
        } else {
            aggregator.report(&week)
        }
    }

    fn eligibility(&self) -> Eligibility {
        let data = &self.data;
        Eligibility::new(
            &data.aliases,
            data.removed.all().map(|p| p.player_name.as_str()),
            data.leaders.active_names(),
        )
    }

    /// Scores the season and stores the result, replacing any earlier
    /// snapshot with the same name and dates.
    pub fn generate_season(&mut self, query: SeasonQuery) -> Result<SeasonSnapshot> {
        let rows = SeasonScorer::new(&self.data.rankings, &self.data.events, &self.data.kudos, &self.data.aliases)
            .score(&query, &self.eligibility())?;
        let snapshot = SeasonSnapshot {
            key: query.key(),
            weights: query.weights,
            rows,
        };
        let stored = snapshot.clone();
        let cleared = self.mutate(|data| Ok(data.seasons.replace(stored)))?;
        if cleared > 0 {
            info!("replaced {cleared} rows of season '{}'", snapshot.key.season_name);
        }
        Ok(snapshot)
    }

    pub fn season(&self, key: &SeasonKey) -> Option<&SeasonSnapshot> {
        self.data.seasons.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SeasonWeights;

    fn date(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn vip(d: &str, conductor: &str, vip: &str) -> VipSelection {
        VipSelection {
            date: date(d),
            train_time: "04:00".to_string(),
            conductor: conductor.to_string(),
            vip_player: vip.to_string(),
            notes: String::new(),
        }
    }

    /// Accepts loads but refuses every save.
    struct BrokenBackend;

    impl RosterBackend for BrokenBackend {
        fn load(&self) -> Result<Option<RosterSnapshot>> {
            Ok(None)
        }

        fn save(&mut self, _snapshot: &RosterSnapshot) -> Result<()> {
            Err(RosterError::BackingStoreUnavailable("disk on fire".to_string()))
        }

        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    struct UnreadableBackend;

    impl RosterBackend for UnreadableBackend {
        fn load(&self) -> Result<Option<RosterSnapshot>> {
            Err(RosterError::BackingStoreUnavailable("unreachable".to_string()))
        }

        fn save(&mut self, _snapshot: &RosterSnapshot) -> Result<()> {
            Err(RosterError::BackingStoreUnavailable("unreachable".to_string()))
        }

        fn describe(&self) -> String {
            "unreadable".to_string()
        }
    }

    #[test]
    fn dave_with_history_is_kept_inactive() {
        let mut roster = Roster::in_memory();
        roster.add_leader("Alice").unwrap();
        roster.add_leader("Dave").unwrap();
        roster.set_vip_for_date(vip("2025-01-06", "Dave", "Eve")).unwrap();

        let err = roster.remove_leader("Dave").unwrap_err();
        assert!(matches!(err, RosterError::ConflictWithHistory { ref player } if player == "Dave"));

        let dave = roster.data().leaders.get("Dave").unwrap();
        assert!(!dave.is_active);
        assert_eq!(roster.rotation().len(), 1);
    }

    #[test]
    fn failed_save_leaves_state_untouched() {
        let mut roster = Roster::open(Box::new(BrokenBackend)).unwrap();
        let err = roster.add_leader("Alice").unwrap_err();
        assert!(matches!(err, RosterError::BackingStoreUnavailable(_)));
        assert!(roster.data().leaders.list().is_empty());
        assert!(roster.rotation().is_empty());
    }

    #[test]
    fn offline_mode_is_explicit() {
        assert!(matches!(
            Roster::open_or_offline(Box::new(UnreadableBackend), false),
            Err(RosterError::BackingStoreUnavailable(_))
        ));
        let mut roster = Roster::open_or_offline(Box::new(UnreadableBackend), true).unwrap();
        assert_eq!(roster.mode(), StoreMode::Offline);
        roster.add_leader("Alice").unwrap();

        let mut broken = Roster::open(Box::new(BrokenBackend)).unwrap();
        assert_eq!(broken.mode(), StoreMode::Primary);
        broken.engage_offline();
        assert_eq!(broken.mode(), StoreMode::Offline);
        broken.add_leader("Alice").unwrap();
        assert_eq!(broken.rotation().len(), 1);
    }

    #[test]
    fn deleting_an_event_cascades_to_its_rankings() {
        let mut roster = Roster::in_memory();
        let event = roster
            .create_event(NewSpecialEvent {
                name: "Bear Hunt".to_string(),
                start_date: date("2025-01-06"),
                end_date: date("2025-01-06"),
                weight: None,
                pinned: false,
            })
            .unwrap();
        let day = DayRef::Event(event.key.clone());
        roster
            .import_rankings(day.clone(), vec![RankingRecord::new(day.clone(), 1, "Alice", 10)])
            .unwrap();
        let (_, rows) = roster.delete_event(&event.key).unwrap();
        assert_eq!(rows, 1);
        assert!(roster.data().rankings.for_day(&day).is_empty());
        assert!(matches!(
            roster.import_rankings(day.clone(), Vec::new()),
            Err(RosterError::NotFound(_))
        ));
    }

    #[test]
    fn confirm_train_advances_rotation() {
        let mut roster = Roster::in_memory();
        for name in ["Alice", "Bob", "Carol"] {
            roster.add_leader(name).unwrap();
        }
        assert!(matches!(
            roster.confirm_train(vip("2025-01-06", "Bob", "Eve")),
            Err(RosterError::Validation(_))
        ));
        roster.confirm_train(vip("2025-01-06", "alice", "Eve")).unwrap();
        assert_eq!(roster.next_leader_due().unwrap().player_name, "Bob");
        assert_eq!(roster.data().vip.for_date(date("2025-01-06")).len(), 1);
    }

    #[test]
    fn season_regeneration_replaces_snapshot_and_skips_leaders() {
        let mut roster = Roster::in_memory();
        roster.add_leader("Leader").unwrap();
        let day = DayRef::Calendar(date("2025-01-06"));
        roster
            .import_rankings(
                day.clone(),
                vec![
                    RankingRecord::new(day.clone(), 1, "Leader", 100),
                    RankingRecord::new(day.clone(), 2, "Alice", 90),
                    RankingRecord::new(day.clone(), 3, "Gone", 80),
                ],
            )
            .unwrap();
        roster.remove_player("gone", date("2025-01-07"), "left").unwrap();

        let query = SeasonQuery {
            season_name: "S1".to_string(),
            start_date: date("2025-01-06"),
            end_date: date("2025-01-12"),
            weights: SeasonWeights::default(),
        };
        let first = roster.generate_season(query.clone()).unwrap();
        let names: Vec<&str> = first.rows.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, vec!["Alice"]);

        roster.award_kudos("Alice", date("2025-01-08"), 10).unwrap();
        let second = roster.generate_season(query.clone()).unwrap();
        assert_eq!(roster.data().seasons.all().count(), 1);
        let stored = roster.season(&query.key()).unwrap();
        assert_eq!(stored.rows, second.rows);
        assert!(stored.rows[0].kudos_score > first.rows[0].kudos_score);
    }

    #[test]
    fn search_matches_aliases() {
        let mut roster = Roster::in_memory();
        let day = DayRef::Calendar(date("2025-01-06"));
        roster
            .import_rankings(day.clone(), vec![RankingRecord::new(day, 1, "Al1ce", 10)])
            .unwrap();
        roster.add_alias("Alice", "Al1ce", "admin").unwrap();
        assert_eq!(roster.search_players("alic"), vec!["Alice".to_string()]);
        assert_eq!(roster.search_players("1c"), vec!["Alice".to_string()]);
        assert!(roster.search_players("zzz").is_empty());
    }

    #[test]
    fn state_survives_reopen() {
        let mut roster = Roster::in_memory();
        roster.add_leader("Alice").unwrap();
        let snapshot = roster.data().snapshot();
        let reopened = Roster::open(Box::new(MemoryBackend::with_snapshot(snapshot))).unwrap();
        assert_eq!(reopened.next_leader_due().unwrap().player_name, "Alice");
    }
}
