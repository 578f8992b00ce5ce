use std::collections::BTreeMap;

use chrono::NaiveTime;
use log::warn;

use crate::alias::{name_key, AliasResolver};
use crate::date_key::DateKey;
use crate::error::{Result, RosterError};
use crate::store::types::{
    KudosAward, RemovedPlayer, SeasonKey, SeasonSnapshot, VipSelection, DEFAULT_TRAIN_TIME,
};

/// Normalizes "4:00", "04:00" or "04:00:00" to `HH:MM:SS`
pub fn normalize_train_time(value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(DEFAULT_TRAIN_TIME.to_string());
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(|t| t.format("%H:%M:%S").to_string())
        .map_err(|_| RosterError::Validation(format!("invalid train time '{value}'")))
}

/// VIP picks, one per (date, train time)
#[derive(Debug, Clone, Default)]
pub struct VipLedger {
    selections: BTreeMap<(DateKey, String), VipSelection>,
}

impl VipLedger {
    /// Loads stored selections, normalizing train times so "04:00" and
    /// "04:00:00" on one date land on the same train. Later entries win.
    pub fn from_selections(selections: Vec<VipSelection>) -> Self {
        let mut ledger = VipLedger::default();
        for mut selection in selections {
            match normalize_train_time(&selection.train_time) {
                Ok(time) => selection.train_time = time,
                Err(_) => warn!(
                    "keeping unrecognized train time '{}' for {}",
                    selection.train_time, selection.date
                ),
            }
            let key = (selection.date, selection.train_time.clone());
            if ledger.selections.insert(key, selection).is_some() {
                warn!("duplicate stored VIP selection replaced while loading");
            }
        }
        ledger
    }

    /// Creates or overwrites the selection for the train at `(date, train_time)`.
    pub fn set_vip_for_date(&mut self, mut selection: VipSelection) -> Result<VipSelection> {
        selection.conductor = selection.conductor.trim().to_string();
        selection.vip_player = selection.vip_player.trim().to_string();
        if selection.conductor.is_empty() {
            return RosterError::validation("conductor is required");
        }
        if selection.vip_player.is_empty() {
            return RosterError::validation("VIP player is required");
        }
        selection.train_time = normalize_train_time(&selection.train_time)?;
        self.selections
            .insert((selection.date, selection.train_time.clone()), selection.clone());
        Ok(selection)
    }

    pub fn delete(&mut self, date: DateKey, train_time: &str) -> Result<VipSelection> {
        let time = normalize_train_time(train_time)?;
        self.selections
            .remove(&(date, time.clone()))
            .ok_or_else(|| RosterError::NotFound(format!("VIP selection for {date} {time}")))
    }

    /// Drops every train on `date`. Zero removed is not an error here.
    pub fn delete_for_date(&mut self, date: DateKey) -> usize {
        let before = self.selections.len();
        self.selections.retain(|(d, _), _| *d != date);
        before - self.selections.len()
    }

    pub fn for_date(&self, date: DateKey) -> Vec<&VipSelection> {
        self.selections
            .range((date, String::new())..)
            .take_while(|((d, _), _)| *d == date)
            .map(|(_, s)| s)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &VipSelection> {
        self.selections.values()
    }

    /// Trains conducted by `player` (or any of their aliases)
    pub fn history_for(&self, resolver: &AliasResolver, player: &str) -> Vec<&VipSelection> {
        let key = resolver.canonical_key(player);
        self.selections
            .values()
            .filter(|s| resolver.canonical_key(&s.conductor) == key)
            .collect()
    }

    pub fn conductor_counts(&self, resolver: &AliasResolver) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for selection in self.selections.values() {
            *counts.entry(resolver.resolve(&selection.conductor)).or_insert(0) += 1;
        }
        counts
    }
}

/// Kudos awards keyed by (player, date) with upsert semantics
#[derive(Debug, Clone, Default)]
pub struct KudosLedger {
    awards: BTreeMap<(String, DateKey), KudosAward>,
}

impl KudosLedger {
    pub fn from_awards(awards: Vec<KudosAward>) -> Self {
        KudosLedger {
            awards: awards
                .into_iter()
                .map(|a| ((name_key(&a.player_name), a.date), a))
                .collect(),
        }
    }

    pub fn award(&mut self, player: &str, date: DateKey, value: u8) -> Result<KudosAward> {
        let player = player.trim();
        if player.is_empty() {
            return RosterError::validation("player name is required");
        }
        if !(1..=10).contains(&value) {
            return RosterError::validation(format!("kudos must be between 1 and 10, got {value}"));
        }
        let award = KudosAward {
            player_name: player.to_string(),
            date,
            value,
        };
        self.awards.insert((name_key(player), date), award.clone());
        Ok(award)
    }

    /// Most recent award in `[start, end]` for the player, following aliases.
    pub fn latest_in_range(
        &self,
        resolver: &AliasResolver,
        player: &str,
        start: DateKey,
        end: DateKey,
    ) -> Option<&KudosAward> {
        let key = resolver.canonical_key(player);
        self.awards
            .values()
            .filter(|a| a.date.is_within(start, end) && resolver.canonical_key(&a.player_name) == key)
            .max_by_key(|a| a.date)
    }

    pub fn in_range(&self, start: DateKey, end: DateKey) -> impl Iterator<Item = &KudosAward> {
        self.awards.values().filter(move |a| a.date.is_within(start, end))
    }

    pub fn all(&self) -> impl Iterator<Item = &KudosAward> {
        self.awards.values()
    }
}

/// Players taken off the season leaderboard
#[derive(Debug, Clone, Default)]
pub struct RemovedPlayers {
    players: BTreeMap<String, RemovedPlayer>,
}

impl RemovedPlayers {
    pub fn from_players(players: Vec<RemovedPlayer>) -> Self {
        RemovedPlayers {
            players: players
                .into_iter()
                .map(|p| (name_key(&p.player_name), p))
                .collect(),
        }
    }

    pub fn remove(&mut self, player: &str, removed_on: DateKey, reason: &str) -> Result<RemovedPlayer> {
        let player = player.trim();
        if player.is_empty() {
            return RosterError::validation("player name is required");
        }
        let entry = RemovedPlayer {
            player_name: player.to_string(),
            removed_on,
            reason: reason.trim().to_string(),
        };
        self.players.insert(name_key(player), entry.clone());
        Ok(entry)
    }

    pub fn restore(&mut self, player: &str) -> Result<RemovedPlayer> {
        self.players
            .remove(&name_key(player))
            .ok_or_else(|| RosterError::NotFound(format!("removed player {}", player.trim())))
    }

    pub fn all(&self) -> impl Iterator<Item = &RemovedPlayer> {
        self.players.values()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeasonSnapshots {
    snapshots: BTreeMap<SeasonKey, SeasonSnapshot>,
}

impl SeasonSnapshots {
    pub fn from_snapshots(snapshots: Vec<SeasonSnapshot>) -> Self {
        SeasonSnapshots {
            snapshots: snapshots.into_iter().map(|s| (s.key.clone(), s)).collect(),
        }
    }

    /// Clears any snapshot stored under the same key, then stores this one.
    /// Returns how many rows the previous snapshot held.
    pub fn replace(&mut self, snapshot: SeasonSnapshot) -> usize {
        let cleared = self
            .snapshots
            .remove(&snapshot.key)
            .map(|old| old.rows.len())
            .unwrap_or(0);
        self.snapshots.insert(snapshot.key.clone(), snapshot);
        cleared
    }

    pub fn get(&self, key: &SeasonKey) -> Option<&SeasonSnapshot> {
        self.snapshots.get(key)
    }

    pub fn all(&self) -> impl Iterator<Item = &SeasonSnapshot> {
        self.snapshots.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::SeasonWeights;

    fn date(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn selection(d: &str, time: &str, conductor: &str, vip: &str) -> VipSelection {
        VipSelection {
            date: date(d),
            train_time: time.to_string(),
            conductor: conductor.to_string(),
            vip_player: vip.to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn train_times_normalize() {
        assert_eq!(normalize_train_time("4:00").unwrap(), "04:00:00");
        assert_eq!(normalize_train_time("").unwrap(), DEFAULT_TRAIN_TIME);
        assert_eq!(normalize_train_time("16:30:00").unwrap(), "16:30:00");
        assert!(normalize_train_time("25:00").is_err());
    }

    #[test]
    fn vip_unique_per_date_and_time() {
        let mut ledger = VipLedger::default();
        ledger.set_vip_for_date(selection("2025-01-06", "04:00", "Dave", "Eve")).unwrap();
        ledger.set_vip_for_date(selection("2025-01-06", "04:00:00", "Dave", "Frank")).unwrap();
        ledger.set_vip_for_date(selection("2025-01-06", "16:00", "Carol", "Gus")).unwrap();
        ledger.set_vip_for_date(selection("2025-01-07", "04:00", "Carol", "Hal")).unwrap();

        let trains = ledger.for_date(date("2025-01-06"));
        assert_eq!(trains.len(), 2);
        assert_eq!(trains[0].vip_player, "Frank");

        assert_eq!(ledger.delete_for_date(date("2025-01-06")), 2);
        assert_eq!(ledger.delete_for_date(date("2025-01-06")), 0);
        assert!(matches!(ledger.delete(date("2025-01-06"), "04:00"), Err(RosterError::NotFound(_))));
        assert!(ledger.delete(date("2025-01-07"), "4:00").is_ok());
    }

    #[test]
    fn loading_merges_equivalent_train_times() {
        let ledger = VipLedger::from_selections(vec![
            selection("2025-01-06", "04:00", "Dave", "Eve"),
            selection("2025-01-06", "04:00:00", "Dave", "Frank"),
            selection("2025-01-06", "16:30", "Alice", "Gus"),
        ]);
        let trains = ledger.for_date(date("2025-01-06"));
        assert_eq!(trains.len(), 2);
        assert_eq!(trains[0].train_time, "04:00:00");
        assert_eq!(trains[0].vip_player, "Frank");
    }

    #[test]
    fn conductor_history_follows_aliases() {
        let mut resolver = AliasResolver::default();
        resolver.add("Dave", "DaveAlt", "admin").unwrap();
        let mut ledger = VipLedger::default();
        ledger.set_vip_for_date(selection("2025-01-06", "04:00", "davealt", "Eve")).unwrap();
        assert_eq!(ledger.history_for(&resolver, "DAVE").len(), 1);
        assert_eq!(ledger.conductor_counts(&resolver).get("Dave"), Some(&1));
    }

    #[test]
    fn kudos_upsert_and_latest() {
        let resolver = AliasResolver::default();
        let mut ledger = KudosLedger::default();
        ledger.award("Alice", date("2025-01-06"), 4).unwrap();
        ledger.award("alice", date("2025-01-06"), 7).unwrap();
        ledger.award("Alice", date("2025-01-09"), 2).unwrap();
        assert_eq!(ledger.all().count(), 2);

        let latest = ledger
            .latest_in_range(&resolver, "ALICE", date("2025-01-01"), date("2025-01-08"))
            .unwrap();
        assert_eq!(latest.value, 7);
        assert!(matches!(ledger.award("Alice", date("2025-01-06"), 11), Err(RosterError::Validation(_))));
        assert!(matches!(ledger.award("Alice", date("2025-01-06"), 0), Err(RosterError::Validation(_))));
    }

    #[test]
    fn season_replace_clears_previous_rows() {
        let key = SeasonKey {
            season_name: "S1".to_string(),
            start_date: date("2025-01-01"),
            end_date: date("2025-01-31"),
        };
        let mut snapshots = SeasonSnapshots::default();
        let snapshot = SeasonSnapshot {
            key: key.clone(),
            weights: SeasonWeights::default(),
            rows: Vec::new(),
        };
        assert_eq!(snapshots.replace(snapshot.clone()), 0);
        assert_eq!(snapshots.replace(snapshot), 0);
        assert_eq!(snapshots.all().count(), 1);
        assert!(snapshots.get(&key).is_some());
    }

    #[test]
    fn removed_players_restore() {
        let mut removed = RemovedPlayers::default();
        removed.remove("Zed", date("2025-01-06"), "left alliance").unwrap();
        assert_eq!(removed.all().next().unwrap().player_name, "Zed");
        removed.restore("ZED").unwrap();
        assert!(matches!(removed.restore("Zed"), Err(RosterError::NotFound(_))));
    }
}
