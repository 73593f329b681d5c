//! Progress store: everything about the player's multiworld progress that has
//! to outlive a session, plus the save snapshot format it is written as.
//!
//! Persisted layout of the remote save key:
//!
//! ```text
//! { "items":  { "<item id>": count, ... },
//!   "queue":  [ { "item_id": id, "notify": bool }, ... ],
//!   "traps":  { "<item id>": pending_triggers, ... },
//!   "player": <opaque dynamic player blob> }
//! ```

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde_json::{Map, Value};

use crate::ids::NetId;
use crate::queue::QueuedItem;

/// Countdown state of one trap item id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapState {
    /// Received triggers not yet activated.
    pub count: u32,
    /// Active ticks left. Zero means inactive.
    pub remaining: u32,
    /// Cooldown ticks left before the next activation may start.
    pub grace: u32,
}

impl TrapState {
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }
}

/// Decoded contents of the remote save key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveData {
    pub items: BTreeMap<NetId, u32>,
    pub queue: Vec<QueuedItem>,
    pub traps: BTreeMap<NetId, u32>,
    pub player: Value,
}

impl SaveData {
    /// Decode leniently. Missing sections are empty; malformed entries are dropped and logged.
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        let Some(obj) = value.as_object() else {
            warn!("save data is not an object, starting from an empty save");
            return Self::default();
        };
        let queue = match obj.get("queue") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| {
                    let parsed = QueuedItem::from_value(entry);
                    if parsed.is_none() {
                        warn!("save data: dropping malformed queue entry {}", entry);
                    }
                    parsed
                })
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                warn!("save data: queue is not a list ({}), ignoring", other);
                Vec::new()
            }
        };
        Self {
            items: count_map(obj.get("items"), "items"),
            queue,
            traps: count_map(obj.get("traps"), "traps"),
            player: obj.get("player").cloned().unwrap_or(Value::Null),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("items".into(), encode_counts(&self.items));
        obj.insert(
            "queue".into(),
            Value::Array(self.queue.iter().map(|q| q.to_value()).collect()),
        );
        obj.insert("traps".into(), encode_counts(&self.traps));
        obj.insert("player".into(), self.player.clone());
        Value::Object(obj)
    }
}

fn count_map(value: Option<&Value>, what: &str) -> BTreeMap<NetId, u32> {
    let mut out = BTreeMap::new();
    let Some(value) = value else {
        return out;
    };
    let Some(map) = value.as_object() else {
        if !value.is_null() {
            warn!("save data: {} is not an object, ignoring", what);
        }
        return out;
    };
    for (key, count) in map {
        match (key.parse::<i64>(), count.as_u64()) {
            (Ok(id), Some(count)) => {
                out.insert(NetId(id), count.min(u32::MAX as u64) as u32);
            }
            _ => warn!("save data: dropping malformed {} entry '{}'", what, key),
        }
    }
    out
}

fn encode_counts(counts: &BTreeMap<NetId, u32>) -> Value {
    Value::Object(
        counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(id, n)| (id.0.to_string(), Value::from(*n)))
            .collect(),
    )
}

/// Owned counts, progressive counters, trap states and the dynamic player blob.
/// Every mutation marks the store dirty; only a successful flush clears it.
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    persistent: BTreeMap<NetId, u32>,
    progressive: HashMap<NetId, u32>,
    traps: BTreeMap<NetId, TrapState>,
    player: Value,
    dirty: bool,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_count(&self, id: NetId) -> u32 {
        self.persistent.get(&id).copied().unwrap_or(0)
    }

    pub fn has_item(&self, id: NetId) -> bool {
        self.owned_count(id) > 0
    }

    /// Record one new grant. Unique items stay at 1.
    pub fn grant(&mut self, id: NetId, unique: bool) -> u32 {
        self.add_owned(id, 1, unique)
    }

    /// Add `by` to the owned count (clamped to 1 for unique items) and return the result.
    pub fn add_owned(&mut self, id: NetId, by: u32, unique: bool) -> u32 {
        let count = self.persistent.entry(id).or_insert(0);
        *count = if unique {
            1
        } else {
            count.saturating_add(by)
        };
        self.dirty = true;
        *count
    }

    /// Snapshot of owned counts, ascending by id.
    pub fn owned(&self) -> Vec<(NetId, u32)> {
        self.persistent.iter().map(|(id, n)| (*id, *n)).collect()
    }

    /// Advance a progressive chain and return how many times it has advanced.
    pub fn advance_progressive(&mut self, id: NetId) -> u32 {
        let counter = self.progressive.entry(id).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub fn progressive_count(&self, id: NetId) -> u32 {
        self.progressive.get(&id).copied().unwrap_or(0)
    }

    pub fn reset_progressive(&mut self) {
        self.progressive.clear();
    }

    pub fn add_trap_trigger(&mut self, id: NetId, by: u32) {
        let state = self.traps.entry(id).or_default();
        state.count = state.count.saturating_add(by);
        self.dirty = true;
    }

    pub fn trap(&self, id: NetId) -> Option<TrapState> {
        self.traps.get(&id).copied()
    }

    pub fn traps_mut(&mut self) -> &mut BTreeMap<NetId, TrapState> {
        &mut self.traps
    }

    pub fn player(&self) -> &Value {
        &self.player
    }

    pub fn set_player(&mut self, blob: Value) {
        if self.player != blob {
            self.player = blob;
            self.dirty = true;
        }
    }

    /// Forget all owned items, e.g. when the service asks the client to resync from scratch.
    pub fn clear_items(&mut self) {
        self.persistent.clear();
        self.progressive.clear();
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Encode counts, pending trap triggers and the player blob together with the queue.
    pub fn to_save(&self, queue: Vec<QueuedItem>) -> SaveData {
        SaveData {
            items: self.persistent.clone(),
            queue,
            traps: self
                .traps
                .iter()
                .filter(|(_, t)| t.count > 0)
                .map(|(id, t)| (*id, t.count))
                .collect(),
            player: self.player.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unique_items_cap_at_one() {
        let mut store = ProgressStore::new();
        for _ in 0..5 {
            store.grant(NetId(1), true);
            store.grant(NetId(2), false);
        }
        assert_eq!(store.owned_count(NetId(1)), 1);
        assert_eq!(store.owned_count(NetId(2)), 5);
        assert_eq!(store.owned_count(NetId(3)), 0);
        assert!(store.is_dirty());
    }

    #[test]
    fn progressive_counters_reset_independently_of_counts() {
        let mut store = ProgressStore::new();
        store.grant(NetId(1), false);
        assert_eq!(store.advance_progressive(NetId(1)), 1);
        assert_eq!(store.advance_progressive(NetId(1)), 2);
        store.reset_progressive();
        assert_eq!(store.progressive_count(NetId(1)), 0);
        assert_eq!(store.owned_count(NetId(1)), 1);
    }

    #[test]
    fn setting_identical_player_blob_stays_clean() {
        let mut store = ProgressStore::new();
        store.set_player(json!({"health": 10}));
        store.clear_dirty();
        store.set_player(json!({"health": 10}));
        assert!(!store.is_dirty());
        store.set_player(json!({"health": 11}));
        assert!(store.is_dirty());
    }

    #[test]
    fn save_data_encodes_documented_layout() {
        let mut store = ProgressStore::new();
        store.grant(NetId(10), false);
        store.add_trap_trigger(NetId(20), 2);
        store.set_player(json!({"elapsed_ticks": 5}));
        let value = store
            .to_save(vec![QueuedItem::new(NetId(30), false)])
            .to_value();
        assert_eq!(
            value,
            json!({
                "items": {"10": 1},
                "queue": [{"item_id": 30, "notify": false}],
                "traps": {"20": 2},
                "player": {"elapsed_ticks": 5},
            })
        );
    }

    #[test]
    fn lenient_decode_drops_garbage() {
        let save = SaveData::from_value(&json!({
            "items": {"10": 2, "abc": 1, "11": "many"},
            "queue": [7, {"item_id": 8, "notify": false}, "bad"],
            "player": null,
        }));
        assert_eq!(save.items, BTreeMap::from([(NetId(10), 2)]));
        assert_eq!(
            save.queue,
            vec![QueuedItem::new(NetId(7), true), QueuedItem::new(NetId(8), false)]
        );
        assert!(save.traps.is_empty());
        assert!(save.player.is_null());

        assert_eq!(SaveData::from_value(&json!("oops")), SaveData::default());
        assert_eq!(SaveData::from_value(&Value::Null), SaveData::default());
    }
}
