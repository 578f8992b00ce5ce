use std::collections::{BTreeSet, HashMap};

use crate::error::{Result, RosterError};
use crate::store::types::PlayerAlias;

/// Case-folded, trimmed form used to compare player names
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Maps alias names onto primary player names.
///
/// The lookup is built from the alias records it is given and only changes
/// through `refresh` or `add`, so every caller sees the same resolution.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: Vec<PlayerAlias>,
    by_alias: HashMap<String, String>,
}

impl AliasResolver {
    pub fn new(aliases: Vec<PlayerAlias>) -> Self {
        let mut resolver = AliasResolver::default();
        resolver.refresh(aliases);
        resolver
    }

    /// Rebuilds the lookup from scratch. Inactive aliases are kept but ignored.
    pub fn refresh(&mut self, aliases: Vec<PlayerAlias>) {
        self.by_alias = aliases
            .iter()
            .filter(|a| a.is_active)
            .map(|a| (name_key(&a.alias_name), a.primary_name.trim().to_string()))
            .collect();
        self.aliases = aliases;
    }

    pub fn aliases(&self) -> &[PlayerAlias] {
        &self.aliases
    }

    pub fn resolve(&self, name: &str) -> String {
        self.by_alias
            .get(&name_key(name))
            .cloned()
            .unwrap_or_else(|| name.trim().to_string())
    }

    /// Grouping key for a player: the case-folded primary name.
    pub fn canonical_key(&self, name: &str) -> String {
        name_key(&self.resolve(name))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        match self.by_alias.get(&name_key(name)) {
            Some(primary) => name_key(primary) != name_key(name),
            None => false,
        }
    }

    pub fn variations_of(&self, name: &str) -> BTreeSet<String> {
        let primary = self.resolve(name);
        let primary_key = name_key(&primary);
        let mut variations: BTreeSet<String> = self
            .aliases
            .iter()
            .filter(|a| a.is_active && name_key(&a.primary_name) == primary_key)
            .map(|a| a.alias_name.trim().to_string())
            .collect();
        variations.insert(primary);
        variations
    }

    /// True when `query` is a case-insensitive substring of `name` or of any
    /// alias that maps to `name`'s primary.
    pub fn matches(&self, query: &str, name: &str) -> bool {
        let query = name_key(query);
        if query.is_empty() {
            return false;
        }
        self.variations_of(name)
            .iter()
            .any(|variation| variation.to_lowercase().contains(&query))
    }

    pub fn add(&mut self, primary_name: &str, alias_name: &str, created_by: &str) -> Result<PlayerAlias> {
        let primary = primary_name.trim();
        let alias = alias_name.trim();
        if primary.is_empty() || alias.is_empty() {
            return RosterError::validation("primary name and alias name are required");
        }
        // Aliases are not chained: an alias given as primary is followed first.
        let primary = self.resolve(primary);
        if name_key(&primary) == name_key(alias) {
            return RosterError::validation("alias must differ from the primary name");
        }
        if let Some(existing) = self.by_alias.get(&name_key(alias)) {
            if name_key(existing) != name_key(&primary) {
                return RosterError::validation(format!("'{alias}' is already an alias of '{existing}'"));
            }
        }

        let record = PlayerAlias {
            primary_name: primary,
            alias_name: alias.to_string(),
            created_by: created_by.trim().to_string(),
            is_active: true,
        };
        let mut aliases: Vec<PlayerAlias> = self
            .aliases
            .iter()
            .filter(|a| name_key(&a.alias_name) != name_key(alias))
            .cloned()
            .collect();
        aliases.push(record.clone());
        self.refresh(aliases);
        Ok(record)
    }

    pub fn deactivate(&mut self, alias_name: &str) -> Result<()> {
        let key = name_key(alias_name);
        let mut aliases = self.aliases.clone();
        let alias = aliases
            .iter_mut()
            .find(|a| a.is_active && name_key(&a.alias_name) == key)
            .ok_or_else(|| RosterError::NotFound(format!("alias {}", alias_name.trim())))?;
        alias.is_active = false;
        self.refresh(aliases);
        Ok(())
    }
}
