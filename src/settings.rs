//! Slot data delivered by the multiworld service at connect time.
//!
//! The service sends named JSON blobs (`goal`, `locations`, `levels`,
//! `settings`). Each is parsed into a typed record here; anything missing or
//! of the wrong shape falls back to a default and is logged.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{parse_definitions, Ability, ItemDefinition};
use crate::ids::NetId;

fn default_max_health() -> u32 {
    100
}

fn default_max_armor() -> u32 {
    100
}

/// Per-slot tuning. Unknown keys are retained in `extra` and reported once on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSettings {
    #[serde(default = "default_max_health")]
    pub maximum_health: u32,
    #[serde(default = "default_max_armor")]
    pub maximum_armor: u32,
    /// Current health after a recompute; defaults to `maximum_health`.
    #[serde(default)]
    pub starting_health: Option<u32>,
    /// Health items may fill up to twice the maximum.
    #[serde(default)]
    pub overheal: bool,
    #[serde(default)]
    pub lock_crouch: bool,
    #[serde(default)]
    pub lock_jump: bool,
    #[serde(default)]
    pub lock_dive: bool,
    #[serde(default)]
    pub lock_run: bool,
    #[serde(default)]
    pub lock_open: bool,
    #[serde(default)]
    pub lock_use: bool,
    /// Per-item definition overrides, keyed by short or full item id.
    #[serde(default)]
    pub items: Map<String, Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            maximum_health: default_max_health(),
            maximum_armor: default_max_armor(),
            starting_health: None,
            overheal: false,
            lock_crouch: false,
            lock_jump: false,
            lock_dive: false,
            lock_run: false,
            lock_open: false,
            lock_use: false,
            items: Map::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl SlotSettings {
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<SlotSettings>(value.clone()) {
            Ok(settings) => {
                for key in settings.extra.keys() {
                    warn!("slot settings: unrecognized setting '{}'", key);
                }
                settings
            }
            Err(e) => {
                warn!("slot settings: malformed settings blob ({}), using defaults", e);
                SlotSettings::default()
            }
        }
    }

    pub fn is_locked(&self, ability: Ability) -> bool {
        match ability {
            Ability::Crouch => self.lock_crouch,
            Ability::Jump => self.lock_jump,
            Ability::Dive => self.lock_dive,
            Ability::Run => self.lock_run,
            Ability::Open => self.lock_open,
            Ability::Use => self.lock_use,
        }
    }

    pub fn starting_health(&self) -> u32 {
        self.starting_health
            .unwrap_or(self.maximum_health)
            .min(self.health_ceiling(self.maximum_health))
    }

    /// Effective fill limit for a given maximum health.
    pub fn health_ceiling(&self, max: u32) -> u32 {
        if self.overheal {
            max.saturating_mul(2)
        } else {
            max
        }
    }

    pub fn item_overrides(&self, game_id: u8) -> HashMap<NetId, ItemDefinition> {
        parse_definitions(&self.items, game_id)
    }
}

/// Required owned counts per item. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalSet {
    requirements: BTreeMap<NetId, u32>,
}

impl GoalSet {
    pub fn new(requirements: BTreeMap<NetId, u32>) -> Self {
        Self { requirements }
    }

    pub fn from_value(value: &Value, game_id: u8) -> Self {
        let Some(map) = value.as_object() else {
            warn!("slot data: goal is not an object, no goals configured");
            return Self::default();
        };
        let mut requirements = BTreeMap::new();
        for (key, count) in map {
            let (Ok(id), Some(count)) = (key.trim().parse::<i64>(), count.as_u64()) else {
                warn!("slot data: skipping malformed goal entry '{}'", key);
                continue;
            };
            requirements.insert(NetId::normalize(id, game_id), count.min(u32::MAX as u64) as u32);
        }
        Self { requirements }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetId, u32)> + '_ {
        self.requirements.iter().map(|(id, n)| (*id, *n))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }
}

/// Parse a JSON array of integer ids, dropping anything that is not an integer.
pub fn parse_id_list(value: &Value, what: &str) -> Vec<NetId> {
    let Some(list) = value.as_array() else {
        warn!("slot data: {} is not a list", what);
        return Vec::new();
    };
    list.iter()
        .filter_map(|v| match v.as_i64() {
            Some(id) => Some(NetId(id)),
            None => {
                warn!("slot data: skipping non-integer entry in {}: {}", what, v);
                None
            }
        })
        .collect()
}

/// Level unlock ids that are part of this seed.
pub fn parse_used_levels(value: &Value, game_id: u8) -> HashSet<NetId> {
    parse_id_list(value, "levels")
        .into_iter()
        .map(|id| NetId::normalize(id.0, game_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let settings = SlotSettings::from_value(&json!({"lock_jump": true}));
        assert_eq!(settings.maximum_health, 100);
        assert_eq!(settings.starting_health(), 100);
        assert!(settings.is_locked(Ability::Jump));
        assert!(!settings.is_locked(Ability::Crouch));
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let settings = SlotSettings::from_value(&json!({"maximum_health": "lots"}));
        assert_eq!(settings.maximum_health, 100);
        let settings = SlotSettings::from_value(&json!("nope"));
        assert!(!settings.overheal);
    }

    #[test]
    fn unknown_settings_are_retained() {
        let settings = SlotSettings::from_value(&json!({"episode_count": 4}));
        assert_eq!(settings.extra.get("episode_count"), Some(&json!(4)));
    }

    #[test]
    fn overheal_doubles_ceiling() {
        let settings = SlotSettings::from_value(&json!({"overheal": true, "starting_health": 150}));
        assert_eq!(settings.health_ceiling(100), 200);
        assert_eq!(settings.starting_health(), 150);
    }

    #[test]
    fn goal_set_parses_short_and_full_ids() {
        let full = NetId::compose(7, 2);
        let mut raw = json!({"5": 1, "bogus": 1, "8": "x"});
        raw.as_object_mut()
            .unwrap()
            .insert(full.0.to_string(), json!(3));
        let goals = GoalSet::from_value(&raw, 2);
        let entries: Vec<_> = goals.iter().collect();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&(NetId::compose(5, 2), 1)));
        assert!(entries.contains(&(full, 3)));
    }

    #[test]
    fn id_lists_skip_garbage() {
        let ids = parse_id_list(&json!([1, "two", 3]), "locations");
        assert_eq!(ids, vec![NetId(1), NetId(3)]);
        assert!(parse_id_list(&json!({"a": 1}), "locations").is_empty());
    }
}
