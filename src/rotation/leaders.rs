use log::{info, warn};

use crate::alias::{name_key, AliasResolver};
use crate::error::{Result, RosterError};
use crate::rotation::RotationEngine;
use crate::store::{AllianceLeader, VipLedger};

/// What happened to a leader on removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderRemoval {
    Removed,
    /// Kept as inactive because they have conducted trains before.
    SoftDeletedDueToHistory,
}

#[derive(Debug, Clone, Default)]
pub struct LeaderRoster {
    leaders: Vec<AllianceLeader>,
}

impl LeaderRoster {
    pub fn from_leaders(leaders: Vec<AllianceLeader>) -> Self {
        LeaderRoster { leaders }
    }

    pub fn list(&self) -> &[AllianceLeader] {
        &self.leaders
    }

    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.leaders
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.player_name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&AllianceLeader> {
        let key = name_key(name);
        self.leaders.iter().find(|l| name_key(&l.player_name) == key)
    }

    /// Adds (or reactivates) a leader and puts them at the back of the rotation.
    pub fn add(&mut self, name: &str, rotation: &mut RotationEngine) -> Result<AllianceLeader> {
        let name = name.trim();
        if name.is_empty() {
            return RosterError::validation("leader name is required");
        }
        let key = name_key(name);
        let leader = match self.leaders.iter_mut().find(|l| name_key(&l.player_name) == key) {
            Some(existing) if existing.is_active => {
                return RosterError::validation(format!("{} is already an alliance leader", existing.player_name));
            }
            Some(existing) => {
                existing.is_active = true;
                existing.clone()
            }
            None => {
                let leader = AllianceLeader {
                    player_name: name.to_string(),
                    is_active: true,
                };
                self.leaders.push(leader.clone());
                leader
            }
        };

        let in_rotation = rotation.active().iter().any(|e| name_key(&e.player_name) == key);
        if !in_rotation {
            rotation.add(&leader.player_name)?;
        }
        info!("added alliance leader {}", leader.player_name);
        Ok(leader)
    }

    /// Removes a leader. A leader who has conducted any train is only
    /// deactivated, together with their rotation entry.
    pub fn remove(
        &mut self,
        name: &str,
        rotation: &mut RotationEngine,
        vip: &VipLedger,
        resolver: &AliasResolver,
    ) -> Result<LeaderRemoval> {
        let key = name_key(name);
        let position = self
            .leaders
            .iter()
            .position(|l| name_key(&l.player_name) == key)
            .ok_or_else(|| RosterError::NotFound(format!("alliance leader {}", name.trim())))?;
        let player = self.leaders[position].player_name.clone();

        let history = vip.history_for(resolver, &player).len();
        if history > 0 {
            self.leaders[position].is_active = false;
            rotation.deactivate(&player);
            warn!("{player} has conducted {history} train(s); deactivated instead of removed");
            return Ok(LeaderRemoval::SoftDeletedDueToHistory);
        }

        self.leaders.remove(position);
        rotation.remove_player(&player);
        info!("removed alliance leader {player}");
        Ok(LeaderRemoval::Removed)
    }
}
