pub mod types;
pub mod rankings;
pub mod events;
pub mod ledgers;
pub mod backend;

use serde::{Deserialize, Serialize};

pub use backend::{JsonFileBackend, MemoryBackend, RosterBackend};
pub use events::{NewSpecialEvent, SpecialEventPatch, SpecialEventStore};
pub use ledgers::{KudosLedger, RemovedPlayers, SeasonSnapshots, VipLedger};
pub use rankings::RankingStore;
pub use types::*;

/// Everything the roster persists, as one serializable document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterSnapshot {
    #[serde(default)]
    pub rankings: Vec<RankingRecord>,
    #[serde(default)]
    pub special_events: Vec<SpecialEvent>,
    #[serde(default)]
    pub alliance_leaders: Vec<AllianceLeader>,
    #[serde(default)]
    pub rotation: Vec<RotationEntry>,
    #[serde(default)]
    pub vip_selections: Vec<VipSelection>,
    #[serde(default)]
    pub aliases: Vec<PlayerAlias>,
    #[serde(default)]
    pub kudos: Vec<KudosAward>,
    #[serde(default)]
    pub removed_players: Vec<RemovedPlayer>,
    #[serde(default)]
    pub seasons: Vec<SeasonSnapshot>,
}
