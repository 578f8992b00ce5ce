use chrono::NaiveDate;

use crate::alias::name_key;
use crate::date_key::DateKey;
use crate::error::{Result, RosterError};
use crate::store::RotationEntry;

/// Day zero of the date-based conductor schedule
pub fn rotation_epoch() -> DateKey {
    DateKey::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default())
}

/// Round-robin order of train conductors.
///
/// Active entries always hold orders 1..=N. Inactive rows keep whatever order
/// they had when they were deactivated and are ignored by every query.
#[derive(Debug, Clone, Default)]
pub struct RotationEngine {
    entries: Vec<RotationEntry>,
}

impl RotationEngine {
    pub fn from_entries(entries: Vec<RotationEntry>) -> Self {
        let mut engine = RotationEngine { entries };
        engine.densify();
        engine
    }

    pub fn entries(&self) -> &[RotationEntry] {
        &self.entries
    }

    /// Active entries in rotation order.
    pub fn active(&self) -> Vec<&RotationEntry> {
        let mut active: Vec<&RotationEntry> = self.entries.iter().filter(|e| e.is_active).collect();
        active.sort_by_key(|e| e.rotation_order);
        active
    }

    pub fn active_len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active).count()
    }

    fn active_names(&self) -> Vec<String> {
        self.active().into_iter().map(|e| e.player_name.clone()).collect()
    }

    fn find_mut(&mut self, player: &str) -> Option<&mut RotationEntry> {
        let key = name_key(player);
        self.entries.iter_mut().find(|e| name_key(&e.player_name) == key)
    }

    /// Rewrites active orders to 1..=N, keeping their relative order.
    fn densify(&mut self) {
        let names = self.active_names();
        self.assign_orders(&names);
    }

    fn assign_orders(&mut self, ordered: &[String]) {
        for (i, name) in ordered.iter().enumerate() {
            if let Some(entry) = self.find_mut(name) {
                entry.rotation_order = i as u32 + 1;
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.active_len();
        if index >= len {
            return RosterError::not_found(format!("rotation index {index} (rotation has {len} entries)"));
        }
        Ok(())
    }

    /// Conductor for `date` by the date formula: days since the epoch modulo
    /// the current active roster size.
    ///
    /// The result depends on today's roster size, so adding or removing a
    /// leader changes who the formula names for past dates as well.
    pub fn current_conductor(&self, date: DateKey) -> Option<&RotationEntry> {
        let active = self.active();
        if active.is_empty() {
            return None;
        }
        let index = date.days_since(rotation_epoch()).rem_euclid(active.len() as i64) as usize;
        active.get(index).copied()
    }

    /// Front of the line, used when admins assign conductors by hand.
    pub fn next_leader_due(&self) -> Option<&RotationEntry> {
        self.entries.iter().find(|e| e.is_active && e.rotation_order == 1)
    }

    /// Appends a player at the back of the line, reactivating an old row if
    /// one exists.
    pub fn add(&mut self, player: &str) -> Result<&RotationEntry> {
        let player = player.trim();
        if player.is_empty() {
            return RosterError::validation("player name is required");
        }
        let next_order = self.active_len() as u32 + 1;
        let key = name_key(player);
        let position = match self.entries.iter().position(|e| name_key(&e.player_name) == key) {
            Some(i) if self.entries[i].is_active => {
                return RosterError::validation(format!("{player} is already in the rotation"));
            }
            Some(i) => {
                self.entries[i].is_active = true;
                self.entries[i].rotation_order = next_order;
                i
            }
            None => {
                self.entries.push(RotationEntry {
                    player_name: player.to_string(),
                    rotation_order: next_order,
                    is_active: true,
                });
                self.entries.len() - 1
            }
        };
        Ok(&self.entries[position])
    }

    /// Sends the front entry to the back; everyone else moves up one.
    pub fn advance(&mut self) -> Result<()> {
        let n = self.active_len() as u32;
        if n == 0 {
            return RosterError::not_found("rotation entries");
        }
        for entry in self.entries.iter_mut().filter(|e| e.is_active) {
            entry.rotation_order = if entry.rotation_order == 1 { n } else { entry.rotation_order - 1 };
        }
        Ok(())
    }

    fn swap(&mut self, a: usize, b: usize) {
        let mut names = self.active_names();
        names.swap(a, b);
        self.assign_orders(&names);
    }

    pub fn move_up(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index == 0 {
            return RosterError::validation("the first entry cannot move up");
        }
        self.swap(index - 1, index);
        Ok(())
    }

    pub fn move_down(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 == self.active_len() {
            return RosterError::validation("the last entry cannot move down");
        }
        self.swap(index, index + 1);
        Ok(())
    }

    /// Deletes the active entry at `index` and closes the gap.
    pub fn remove(&mut self, index: usize) -> Result<RotationEntry> {
        self.check_index(index)?;
        let name = self.active_names().remove(index);
        let key = name_key(&name);
        let position = self
            .entries
            .iter()
            .position(|e| name_key(&e.player_name) == key)
            .ok_or_else(|| RosterError::NotFound(format!("rotation entry {name}")))?;
        let removed = self.entries.remove(position);
        self.densify();
        Ok(removed)
    }

    /// Hard-deletes a player's row (active or not) and re-densifies.
    pub fn remove_player(&mut self, player: &str) -> Option<RotationEntry> {
        let key = name_key(player);
        let position = self.entries.iter().position(|e| name_key(&e.player_name) == key)?;
        let removed = self.entries.remove(position);
        self.densify();
        Some(removed)
    }

    /// Marks a player's row inactive without touching its order number, then
    /// closes the gap among the remaining active rows.
    pub fn deactivate(&mut self, player: &str) -> bool {
        let found = match self.find_mut(player) {
            Some(entry) => {
                entry.is_active = false;
                true
            }
            None => false,
        };
        if found {
            let names = self.active_names();
            self.assign_orders(&names);
        }
        found
    }

    /// Sets the order to the position of each name in `ordered`, which must
    /// name every active player exactly once.
    pub fn reorder_full(&mut self, ordered: &[String]) -> Result<()> {
        let mut expected: Vec<String> = self.active_names().iter().map(|n| name_key(n)).collect();
        let mut given: Vec<String> = ordered.iter().map(|n| name_key(n)).collect();
        expected.sort();
        given.sort();
        if expected != given {
            return RosterError::validation("new order must list every active rotation member exactly once");
        }
        self.assign_orders(ordered);
        Ok(())
    }
}
