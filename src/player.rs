//! Derived player resource pools and the dynamic player snapshot.
//!
//! Pools are recomputed from persistent item counts whenever a level is
//! entered, so nothing here is saved directly. The parts of player state that
//! cannot be recomputed (current health, ammo left, selected items, elapsed
//! time) travel in the opaque [`DynamicPlayer`] blob instead.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Ability;
use crate::settings::SlotSettings;

/// Capacity bonuses received for one pool. Bonuses add up and the largest
/// `max_capacity` among them is the limit, so the resolved capacity does not
/// depend on the order the items arrived in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityLedger {
    pub bonus: u32,
    pub limit: Option<u32>,
}

impl CapacityLedger {
    fn record(&mut self, by: u32, limit: Option<u32>) {
        self.bonus = self.bonus.saturating_add(by);
        self.limit = self.limit.max(limit);
    }

    fn merge(&mut self, other: CapacityLedger) {
        self.record(other.bonus, other.limit);
    }

    /// A limit below `base` never lowers it.
    fn resolve(&self, base: u32) -> u32 {
        let raised = base.saturating_add(self.bonus);
        match self.limit {
            Some(limit) => raised.min(limit.max(base)),
            None => raised,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gauge {
    pub current: u32,
    pub max: u32,
    base: u32,
    raised: CapacityLedger,
}

impl Gauge {
    fn new(current: u32, base: u32) -> Self {
        Self {
            current,
            max: base,
            base,
            raised: CapacityLedger::default(),
        }
    }

    fn raise(&mut self, by: u32, limit: Option<u32>) {
        self.raised.record(by, limit);
        self.max = self.raised.resolve(self.base);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoPool {
    pub amount: u32,
    pub max: u32,
    /// Largest capacity any weapon using this pool grants.
    base: u32,
    raised: CapacityLedger,
}

impl AmmoPool {
    fn add(&mut self, amount: u32) {
        self.amount = self.amount.saturating_add(amount).min(self.max);
    }

    fn widen(&mut self, capacity: u32) {
        self.base = self.base.max(capacity);
        self.max = self.raised.resolve(self.base);
    }

    fn raise(&mut self, by: u32, limit: Option<u32>) {
        self.raised.record(by, limit);
        self.max = self.raised.resolve(self.base);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub unlocked: bool,
    pub amount: u32,
    pub capacity: u32,
    base: u32,
    raised: CapacityLedger,
}

impl InventorySlot {
    fn settle(&mut self) {
        self.capacity = self.raised.resolve(self.base);
        self.amount = self.amount.min(self.capacity);
    }
}

/// Everything the item applier writes on behalf of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPools {
    pub health: Gauge,
    pub armor: Gauge,
    pub weapons: BTreeSet<String>,
    pub ammo: BTreeMap<String, AmmoPool>,
    pub inventory: BTreeMap<String, InventorySlot>,
    /// Capacity received before its inventory slot was unlocked.
    pub pending_capacity: BTreeMap<String, CapacityLedger>,
    pub keys: BTreeSet<String>,
    pub automaps: BTreeSet<String>,
    pub unlocked_levels: BTreeSet<String>,
    pub abilities: BTreeSet<Ability>,
}

impl PlayerPools {
    /// Baseline pools before any item has been applied.
    pub fn baseline(settings: &SlotSettings) -> Self {
        Self {
            health: Gauge::new(settings.starting_health(), settings.maximum_health),
            armor: Gauge::new(0, settings.maximum_armor),
            ..Self::default()
        }
    }

    pub fn give_weapon(&mut self, weapon: &str, ammo: u32, capacity: u32) {
        self.weapons.insert(weapon.to_string());
        let pool = self.ammo.entry(weapon.to_string()).or_default();
        pool.widen(capacity);
        pool.add(ammo);
    }

    pub fn give_ammo(&mut self, weapon: &str, amount: u32, capacity: u32, max_capacity: Option<u32>) {
        let pool = self.ammo.entry(weapon.to_string()).or_default();
        pool.raise(capacity, max_capacity);
        pool.add(amount);
    }

    pub fn give_inventory(&mut self, slot: &str, amount: u32, capacity: u32) {
        let pending = self.pending_capacity.remove(slot);
        let entry = self.inventory.entry(slot.to_string()).or_default();
        entry.unlocked = true;
        entry.base = entry.base.max(capacity);
        if let Some(pending) = pending {
            entry.raised.merge(pending);
        }
        entry.amount = entry.amount.saturating_add(amount);
        entry.settle();
    }

    pub fn give_inventory_capacity(&mut self, slot: &str, capacity: u32, max_capacity: Option<u32>) {
        match self.inventory.get_mut(slot) {
            Some(entry) if entry.unlocked => {
                entry.raised.record(capacity, max_capacity);
                entry.settle();
            }
            _ => {
                self.pending_capacity
                    .entry(slot.to_string())
                    .or_default()
                    .record(capacity, max_capacity);
            }
        }
    }

    /// Raise maximum health, then fill current up to the effective ceiling. Never lowers current.
    pub fn give_health(&mut self, amount: u32, capacity: u32, max_capacity: Option<u32>, settings: &SlotSettings) {
        self.health.raise(capacity, max_capacity);
        let ceiling = settings.health_ceiling(self.health.max);
        self.health.current = fill(self.health.current, amount, ceiling);
    }

    pub fn give_armor(&mut self, amount: u32, capacity: u32, max_capacity: Option<u32>) {
        self.armor.raise(capacity, max_capacity);
        self.armor.current = fill(self.armor.current, amount, self.armor.max);
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

fn fill(current: u32, amount: u32, ceiling: u32) -> u32 {
    current.max(current.saturating_add(amount).min(ceiling))
}

/// Typed view over the opaque dynamic player blob.
///
/// Only the fields below are written by this crate. Everything else in the
/// blob (selected items, engine-specific state) belongs to the engine and is
/// carried through `extra` untouched, including typed fields that fail to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicPlayer {
    pub health: Option<u32>,
    pub armor: Option<u32>,
    pub ammo: BTreeMap<String, u32>,
    pub inventory: BTreeMap<String, u32>,
    pub elapsed_ticks: u64,
    pub extra: Map<String, Value>,
}

impl DynamicPlayer {
    /// Read the typed view out of a blob, field by field. A field with an
    /// unexpected shape falls back to its default and stays in `extra` as is.
    pub fn from_blob(blob: &Value) -> Self {
        let Some(obj) = blob.as_object() else {
            if !blob.is_null() {
                warn!("dynamic player snapshot is not an object, ignoring");
            }
            return Self::default();
        };
        Self {
            health: field(obj, "health"),
            armor: field(obj, "armor"),
            ammo: field(obj, "ammo").unwrap_or_default(),
            inventory: field(obj, "inventory").unwrap_or_default(),
            elapsed_ticks: field(obj, "elapsed_ticks").unwrap_or_default(),
            extra: obj.clone(),
        }
    }

    pub fn to_blob(&self) -> Value {
        let mut out = self.extra.clone();
        if let Some(health) = self.health {
            out.insert("health".into(), health.into());
        }
        if let Some(armor) = self.armor {
            out.insert("armor".into(), armor.into());
        }
        out.insert("ammo".into(), counts(&self.ammo));
        out.insert("inventory".into(), counts(&self.inventory));
        out.insert("elapsed_ticks".into(), self.elapsed_ticks.into());
        Value::Object(out)
    }

    /// Record the non-derivable parts of the current pools.
    pub fn capture(&mut self, pools: &PlayerPools) {
        self.health = Some(pools.health.current);
        self.armor = Some(pools.armor.current);
        self.ammo = pools
            .ammo
            .iter()
            .map(|(k, v)| (k.clone(), v.amount))
            .collect();
        self.inventory = pools
            .inventory
            .iter()
            .filter(|(_, v)| v.unlocked)
            .map(|(k, v)| (k.clone(), v.amount))
            .collect();
    }

    /// Put saved values back onto freshly recomputed pools, clamped to their limits.
    pub fn restore(&self, pools: &mut PlayerPools, settings: &SlotSettings) {
        if let Some(health) = self.health {
            pools.health.current = health.min(settings.health_ceiling(pools.health.max));
        }
        if let Some(armor) = self.armor {
            pools.armor.current = armor.min(pools.armor.max);
        }
        for (weapon, amount) in &self.ammo {
            if let Some(pool) = pools.ammo.get_mut(weapon) {
                pool.amount = (*amount).min(pool.max);
            }
        }
        for (slot, amount) in &self.inventory {
            if let Some(entry) = pools.inventory.get_mut(slot) {
                if entry.unlocked {
                    entry.amount = (*amount).min(entry.capacity);
                }
            }
        }
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("dynamic player field '{}' unreadable ({}), keeping it as is", key, e);
            None
        }
    }
}

fn counts(map: &BTreeMap<String, u32>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn health_never_decreases_and_respects_ceiling() {
        let settings = SlotSettings::default();
        let mut pools = PlayerPools::baseline(&settings);
        pools.health.current = 90;
        pools.give_health(50, 0, None, &settings);
        assert_eq!(pools.health.current, 100);

        pools.health.current = 150; // e.g. restored from an overheal session
        pools.give_health(10, 0, None, &settings);
        assert_eq!(pools.health.current, 150);
    }

    #[test]
    fn overheal_allows_double_maximum() {
        let settings = SlotSettings::from_value(&json!({"overheal": true}));
        let mut pools = PlayerPools::baseline(&settings);
        pools.give_health(500, 0, None, &settings);
        assert_eq!(pools.health.current, 200);
    }

    #[test]
    fn health_capacity_honors_max_capacity() {
        let settings = SlotSettings::default();
        let mut pools = PlayerPools::baseline(&settings);
        pools.give_health(0, 50, Some(120), &settings);
        assert_eq!(pools.health.max, 120);
        pools.give_health(0, 50, Some(120), &settings);
        assert_eq!(pools.health.max, 120);
    }

    #[test]
    fn capacity_before_unlock_is_held_pending() {
        let mut pools = PlayerPools::default();
        pools.give_inventory_capacity("medkit", 50, None);
        assert_eq!(
            pools.pending_capacity.get("medkit"),
            Some(&CapacityLedger {
                bonus: 50,
                limit: None
            })
        );
        assert!(!pools.inventory.contains_key("medkit"));

        pools.give_inventory("medkit", 120, 100);
        let slot = pools.inventory["medkit"];
        assert!(slot.unlocked);
        assert_eq!(slot.capacity, 150);
        assert_eq!(slot.amount, 120);
        assert!(pools.pending_capacity.is_empty());

        pools.give_inventory_capacity("medkit", 25, Some(160));
        assert_eq!(pools.inventory["medkit"].capacity, 160);
    }

    #[test]
    fn pending_capacity_limit_matches_unlocked_order() {
        let mut early = PlayerPools::default();
        early.give_inventory_capacity("jetpack", 50, Some(120));
        early.give_inventory("jetpack", 0, 100);

        let mut late = PlayerPools::default();
        late.give_inventory("jetpack", 0, 100);
        late.give_inventory_capacity("jetpack", 50, Some(120));

        assert_eq!(early.inventory["jetpack"], late.inventory["jetpack"]);
        assert_eq!(early.inventory["jetpack"].capacity, 120);
    }

    #[test]
    fn capacity_limits_ignore_arrival_order() {
        let settings = SlotSettings::default();
        let mut small_first = PlayerPools::baseline(&settings);
        small_first.give_ammo("pistol", 0, 50, Some(60));
        small_first.give_ammo("pistol", 0, 50, Some(200));
        small_first.give_health(0, 50, Some(120), &settings);
        small_first.give_health(0, 50, Some(300), &settings);
        small_first.give_inventory_capacity("medkit", 50, Some(60));
        small_first.give_inventory("medkit", 0, 0);
        small_first.give_inventory_capacity("medkit", 50, Some(200));

        let mut big_first = PlayerPools::baseline(&settings);
        big_first.give_health(0, 50, Some(300), &settings);
        big_first.give_health(0, 50, Some(120), &settings);
        big_first.give_ammo("pistol", 0, 50, Some(200));
        big_first.give_ammo("pistol", 0, 50, Some(60));
        big_first.give_inventory_capacity("medkit", 50, Some(200));
        big_first.give_inventory("medkit", 0, 0);
        big_first.give_inventory_capacity("medkit", 50, Some(60));

        assert_eq!(small_first, big_first);
        assert_eq!(small_first.ammo["pistol"].max, 100);
        assert_eq!(small_first.health.max, 200);
        assert_eq!(small_first.inventory["medkit"].capacity, 100);
    }

    #[test]
    fn ammo_is_clamped_to_capacity() {
        let mut pools = PlayerPools::default();
        pools.give_ammo("pistol", 0, 48, Some(200));
        pools.give_weapon("pistol", 100, 0);
        assert_eq!(pools.ammo["pistol"].amount, 48);
        pools.give_ammo("pistol", 10, 500, Some(200));
        assert_eq!(pools.ammo["pistol"].max, 200);
        assert_eq!(pools.ammo["pistol"].amount, 58);
    }

    #[test]
    fn dynamic_snapshot_preserves_unknown_fields() {
        let blob = json!({"health": 42, "ammo": {"pistol": 7}, "visited": ["E1L1"]});
        let mut dynamic = DynamicPlayer::from_blob(&blob);
        assert_eq!(dynamic.health, Some(42));
        let pools = PlayerPools::baseline(&SlotSettings::default());
        dynamic.capture(&pools);
        let out = dynamic.to_blob();
        assert_eq!(out["visited"], json!(["E1L1"]));
        assert_eq!(out["health"], json!(100));
    }

    #[test]
    fn unreadable_fields_keep_the_rest_of_the_blob() {
        let blob = json!({"health": "lots", "selected": 3, "custom": "kept", "ammo": {"pistol": 7}});
        let mut dynamic = DynamicPlayer::from_blob(&blob);
        assert_eq!(dynamic.health, None);
        assert_eq!(dynamic.ammo.get("pistol"), Some(&7));

        // nothing captured yet: the bad field is passed through untouched
        assert_eq!(dynamic.to_blob()["health"], json!("lots"));

        dynamic.capture(&PlayerPools::baseline(&SlotSettings::default()));
        let out = dynamic.to_blob();
        assert_eq!(out["custom"], json!("kept"));
        assert_eq!(out["selected"], json!(3));
        assert_eq!(out["health"], json!(100));
    }

    #[test]
    fn restore_clamps_to_recomputed_limits() {
        let settings = SlotSettings::default();
        let mut pools = PlayerPools::baseline(&settings);
        pools.give_weapon("pistol", 0, 0);
        pools.give_ammo("pistol", 0, 50, None);
        let dynamic = DynamicPlayer::from_blob(&json!({"health": 500, "ammo": {"pistol": 80, "rpg": 3}}));
        dynamic.restore(&mut pools, &settings);
        assert_eq!(pools.health.current, 100);
        assert_eq!(pools.ammo["pistol"].amount, 50);
        assert!(!pools.ammo.contains_key("rpg"));
    }
}
