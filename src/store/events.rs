use std::collections::BTreeMap;

use serde::Deserialize;

use crate::date_key::DateKey;
use crate::error::{Result, RosterError};
use crate::store::types::{SpecialEvent, DEFAULT_EVENT_WEIGHT};

/// Fields accepted when creating a special event
#[derive(Debug, Clone, Deserialize)]
pub struct NewSpecialEvent {
    pub name: String,
    pub start_date: DateKey,
    pub end_date: DateKey,
    pub weight: Option<f64>,
    #[serde(default)]
    pub pinned: bool,
}

/// Partial update for an existing event; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialEventPatch {
    pub name: Option<String>,
    pub start_date: Option<DateKey>,
    pub end_date: Option<DateKey>,
    pub weight: Option<f64>,
    pub pinned: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SpecialEventStore {
    events: BTreeMap<String, SpecialEvent>,
}

fn validate(event: &SpecialEvent) -> Result<()> {
    if event.name.trim().is_empty() {
        return RosterError::validation("event name is required");
    }
    if event.start_date > event.end_date {
        return RosterError::validation(format!(
            "event '{}' ends ({}) before it starts ({})",
            event.name, event.end_date, event.start_date
        ));
    }
    if !event.weight.is_finite() || event.weight < 0.0 {
        return RosterError::validation(format!("invalid event weight {}", event.weight));
    }
    Ok(())
}

fn slug(name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

impl SpecialEventStore {
    pub fn from_events(events: Vec<SpecialEvent>) -> Self {
        SpecialEventStore {
            events: events.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    pub fn create(&mut self, new_event: NewSpecialEvent) -> Result<SpecialEvent> {
        let base = format!("event_{}_{}", slug(&new_event.name), new_event.start_date);
        let mut key = base.clone();
        let mut suffix = 2;
        while self.events.contains_key(&key) {
            key = format!("{base}_{suffix}");
            suffix += 1;
        }

        let event = SpecialEvent {
            key: key.clone(),
            name: new_event.name.trim().to_string(),
            start_date: new_event.start_date,
            end_date: new_event.end_date,
            weight: new_event.weight.unwrap_or(DEFAULT_EVENT_WEIGHT),
            pinned: new_event.pinned,
        };
        validate(&event)?;
        self.events.insert(key, event.clone());
        Ok(event)
    }

    pub fn update(&mut self, key: &str, patch: SpecialEventPatch) -> Result<SpecialEvent> {
        let current = self
            .events
            .get(key)
            .ok_or_else(|| RosterError::NotFound(format!("special event {key}")))?;

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            updated.name = name.trim().to_string();
        }
        if let Some(start) = patch.start_date {
            updated.start_date = start;
        }
        if let Some(end) = patch.end_date {
            updated.end_date = end;
        }
        if let Some(weight) = patch.weight {
            updated.weight = weight;
        }
        if let Some(pinned) = patch.pinned {
            updated.pinned = pinned;
        }
        validate(&updated)?;
        self.events.insert(key.to_string(), updated.clone());
        Ok(updated)
    }

    /// Removes the event. Its rankings are dropped by the caller.
    pub fn delete(&mut self, key: &str) -> Result<SpecialEvent> {
        self.events
            .remove(key)
            .ok_or_else(|| RosterError::NotFound(format!("special event {key}")))
    }

    pub fn get(&self, key: &str) -> Option<&SpecialEvent> {
        self.events.get(key)
    }

    /// Pinned events first, then by start date.
    pub fn list(&self) -> Vec<&SpecialEvent> {
        let mut events: Vec<&SpecialEvent> = self.events.values().collect();
        events.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(a.start_date.cmp(&b.start_date)).then(a.key.cmp(&b.key)));
        events
    }

    pub fn overlapping(&self, start: DateKey, end: DateKey) -> Vec<&SpecialEvent> {
        self.events.values().filter(|e| e.overlaps(start, end)).collect()
    }

    pub fn on_date(&self, date: DateKey) -> Vec<&SpecialEvent> {
        self.events.values().filter(|e| e.covers(date)).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &SpecialEvent> {
        self.events.values()
    }
}
