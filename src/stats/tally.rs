use std::collections::BTreeMap;

use crate::alias::AliasResolver;

/// Counters and point totals that clamp at their maximum instead of wrapping.
pub trait TallyValue: Copy + Default {
    fn saturating_plus(self, other: Self) -> Self;
}

impl TallyValue for u32 {
    fn saturating_plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

impl TallyValue for u64 {
    fn saturating_plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

/// Per-player accumulator that groups name variants under one player.
/// The first spelling seen (after alias resolution) is the one reported.
#[derive(Debug, Clone)]
pub struct PlayerTally<V> {
    entries: BTreeMap<String, (String, V)>,
}

impl<V> Default for PlayerTally<V> {
    fn default() -> Self {
        PlayerTally {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: TallyValue> PlayerTally<V> {
    pub fn add(&mut self, resolver: &AliasResolver, name: &str, value: V) {
        let display = resolver.resolve(name);
        let key = display.to_lowercase();
        let entry = self.entries.entry(key).or_insert_with(|| (display, V::default()));
        entry.1 = entry.1.saturating_plus(value);
    }

    pub fn into_map(self) -> BTreeMap<String, V> {
        self.entries.into_values().collect()
    }

    pub fn filter(self, keep: impl Fn(&V) -> bool) -> Self {
        PlayerTally {
            entries: self.entries.into_iter().filter(|(_, (_, v))| keep(v)).collect(),
        }
    }
}

/// Sorts a player map by value descending, then name ascending.
pub fn sorted_desc<V: Ord + Copy>(map: &BTreeMap<String, V>) -> Vec<(String, V)> {
    let mut rows: Vec<(String, V)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}
