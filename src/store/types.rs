use serde::{Deserialize, Deserializer, Serialize};

use crate::date_key::{DateKey, DayRef};

pub const DEFAULT_TRAIN_TIME: &str = "04:00:00";
pub const DEFAULT_EVENT_WEIGHT: f64 = 10.0;

/// One row of a daily (or special event) ranking list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub day: DayRef,
    pub rank: u32,
    pub commander: String,
    #[serde(deserialize_with = "lenient_points", default)]
    pub points: u64,
}

impl RankingRecord {
    pub fn new(day: DayRef, rank: u32, commander: &str, points: u64) -> Self {
        RankingRecord {
            day,
            rank,
            commander: commander.trim().to_string(),
            points,
        }
    }
}

/// Parses a points value, returning 0 if empty or invalid.
/// Accepts thousands separators ("1,234,567") since OCR'd lists carry them.
pub fn parse_points(value: &str) -> u64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    cleaned.parse().unwrap_or(0)
}

fn lenient_points<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => parse_points(&s),
        _ => 0,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialEvent {
    pub key: String,
    pub name: String,
    pub start_date: DateKey,
    pub end_date: DateKey,
    #[serde(default = "default_event_weight")]
    pub weight: f64,
    #[serde(default)]
    pub pinned: bool,
}

fn default_event_weight() -> f64 {
    DEFAULT_EVENT_WEIGHT
}

impl SpecialEvent {
    pub fn covers(&self, date: DateKey) -> bool {
        date.is_within(self.start_date, self.end_date)
    }

    pub fn overlaps(&self, start: DateKey, end: DateKey) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    /// Alliance contribution events are scored as their own bonus category.
    pub fn is_alliance_contribution(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("alliance") || name.contains("contribution")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceLeader {
    pub player_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEntry {
    pub player_name: String,
    pub rotation_order: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipSelection {
    pub date: DateKey,
    #[serde(default = "default_train_time")]
    pub train_time: String,
    pub conductor: String,
    pub vip_player: String,
    #[serde(default)]
    pub notes: String,
}

fn default_train_time() -> String {
    DEFAULT_TRAIN_TIME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAlias {
    pub primary_name: String,
    pub alias_name: String,
    #[serde(default)]
    pub created_by: String,
    pub is_active: bool,
}

/// A 1-10 kudos award, at most one per player per day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KudosAward {
    pub player_name: String,
    pub date: DateKey,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedPlayer {
    pub player_name: String,
    pub removed_on: DateKey,
    #[serde(default)]
    pub reason: String,
}

/// Percent weights applied to the normalized season sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonWeights {
    pub kudos: f64,
    pub vs_performance: f64,
    pub special_events: f64,
}

impl Default for SeasonWeights {
    fn default() -> Self {
        SeasonWeights {
            kudos: 20.0,
            vs_performance: 50.0,
            special_events: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeasonKey {
    pub season_name: String,
    pub start_date: DateKey,
    pub end_date: DateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRankingRow {
    pub player_name: String,
    pub kudos_score: f64,
    pub vs_performance_score: f64,
    pub special_events_score: f64,
    pub alliance_contribution_score: f64,
    pub total_weighted_score: f64,
    pub final_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSnapshot {
    pub key: SeasonKey,
    pub weights: SeasonWeights,
    pub rows: Vec<SeasonRankingRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_parse_leniently() {
        assert_eq!(parse_points("1,234,567"), 1_234_567);
        assert_eq!(parse_points(" 800 "), 800);
        assert_eq!(parse_points("n/a"), 0);
        assert_eq!(parse_points(""), 0);
        assert_eq!(parse_points("-5"), 0);
    }

    #[test]
    fn record_deserializes_bad_points_as_zero() {
        let rows: Vec<RankingRecord> = serde_json::from_str(
            r#"[
                {"day": "2025-01-06", "rank": 1, "commander": "A", "points": "1,000"},
                {"day": "2025-01-06", "rank": 2, "commander": "B", "points": "??"},
                {"day": "2025-01-06", "rank": 3, "commander": "C", "points": null},
                {"day": "event_1", "rank": 4, "commander": "D"}
            ]"#,
        )
        .unwrap();
        let points: Vec<u64> = rows.iter().map(|r| r.points).collect();
        assert_eq!(points, vec![1000, 0, 0, 0]);
        assert_eq!(rows[3].day, DayRef::Event("event_1".to_string()));
    }

    #[test]
    fn alliance_events_detected_case_insensitively() {
        let event = SpecialEvent {
            key: "e".to_string(),
            name: "Weekly Alliance Championship".to_string(),
            start_date: DateKey::parse("2025-01-06").unwrap(),
            end_date: DateKey::parse("2025-01-08").unwrap(),
            weight: 10.0,
            pinned: false,
        };
        assert!(event.is_alliance_contribution());
        assert!(event.covers(DateKey::parse("2025-01-08").unwrap()));
        assert!(!event.covers(DateKey::parse("2025-01-09").unwrap()));
    }
}
