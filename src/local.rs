//! Offline single-player world.
//!
//! A world file carries everything a multiworld service would otherwise supply
//! for one slot:
//!
//! ```json
//! {
//!   "slot_data":  { "goal": {...}, "locations": [...], "levels": [...], "settings": {...} },
//!   "placements": { "3": 12, "17": 5 },
//!   "flags":      { "3": 1 }
//! }
//! ```
//!
//! `placements` maps short location ids to short item ids of this game and
//! `flags` holds the scout classification bits per location. Saves and the set
//! of checked locations live in a [`SaveStore`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::CoreError;
use crate::ids::{LocationId, NetId};
use crate::location::ScoutEntry;
use crate::storage::SaveStore;
use crate::transport::{Transport, TransportEvent};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalWorld {
    #[serde(default)]
    pub slot_data: Map<String, Value>,
    #[serde(default)]
    pub placements: BTreeMap<i64, i64>,
    #[serde(default)]
    pub flags: BTreeMap<i64, u32>,
}

impl LocalWorld {
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let world: LocalWorld = serde_json::from_str(text)?;
        Ok(world)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let world = Self::from_json_str(&text)?;
        info!(
            "loaded local world {} ({} placements)",
            path.as_ref().display(),
            world.placements.len()
        );
        Ok(world)
    }

    /// Item placed at a location, as a full id of `game_id`.
    pub fn item_at(&self, loc: LocationId, game_id: u8) -> Option<NetId> {
        self.placements
            .get(&i64::from(loc.0))
            .map(|item| NetId::compose(*item, game_id))
    }
}

/// Prefix of the private keys a local slot writes to its save store.
pub fn slot_key_prefix(slot: &str) -> String {
    format!("local_{}", slot)
}

/// Transport that answers every request from a [`LocalWorld`] and a [`SaveStore`].
pub struct LocalTransport {
    world: LocalWorld,
    store: SaveStore,
    game_id: u8,
    slot: String,
    pending: VecDeque<TransportEvent>,
    announced: bool,
    closed: bool,
}

impl LocalTransport {
    pub fn new(world: LocalWorld, store: SaveStore, game_id: u8, slot: impl Into<String>) -> Self {
        Self {
            world,
            store,
            game_id,
            slot: slot.into(),
            pending: VecDeque::new(),
            announced: false,
            closed: false,
        }
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    fn checked_key(&self) -> String {
        format!("{}_checked", self.private_key_prefix())
    }

    /// Short location ids already checked in earlier sessions.
    pub fn checked(&self) -> BTreeSet<i16> {
        match self.store.get(&self.checked_key()) {
            Ok(Some(Value::Array(ids))) => ids
                .iter()
                .filter_map(Value::as_i64)
                .map(|id| LocationId::from_raw(id).0)
                .filter(|id| *id >= 0)
                .collect(),
            Ok(_) => BTreeSet::new(),
            Err(e) => {
                warn!("local world: could not read checked locations: {}", e);
                BTreeSet::new()
            }
        }
    }

    fn store_checked(&self, checked: &BTreeSet<i16>) {
        let value = Value::Array(checked.iter().map(|id| Value::from(*id)).collect());
        if let Err(e) = self.store.put(&self.checked_key(), &value) {
            error!("local world: could not persist checked locations: {}", e);
        }
    }

    fn announce(&mut self) {
        self.announced = true;
        for (key, value) in self.world.slot_data.clone() {
            self.pending.push_back(TransportEvent::SlotData { key, value });
        }
        for loc in self.checked() {
            self.pending.push_back(TransportEvent::LocationChecked(NetId::location(
                LocationId(loc),
                self.game_id,
            )));
        }
    }
}

impl Transport for LocalTransport {
    fn send_location_checks(&mut self, locations: &[NetId]) {
        if self.closed {
            return;
        }
        let mut checked = self.checked();
        let mut changed = false;
        for net in locations {
            let loc = net.short();
            if !checked.insert(loc.0) {
                debug!("local world: location {} already checked", loc);
                continue;
            }
            changed = true;
            self.pending.push_back(TransportEvent::LocationChecked(*net));
            match self.world.item_at(loc, self.game_id) {
                Some(item) => self.pending.push_back(TransportEvent::ItemReceived { item, notify: true }),
                None => warn!("local world: nothing placed at location {}", loc),
            }
        }
        if changed {
            self.store_checked(&checked);
        }
    }

    fn send_scouts(&mut self, locations: &[NetId]) {
        let entries: Vec<ScoutEntry> = locations
            .iter()
            .filter_map(|net| {
                let loc = net.short();
                let item = self.world.item_at(loc, self.game_id)?;
                let flags = self
                    .world
                    .flags
                    .get(&i64::from(loc.0))
                    .copied()
                    .unwrap_or(0);
                Some(ScoutEntry {
                    location: *net,
                    item,
                    flags,
                })
            })
            .collect();
        if !entries.is_empty() {
            self.pending.push_back(TransportEvent::LocationScouted(entries));
        }
    }

    fn request_get(&mut self, key: &str) {
        let value = match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                error!("local world: reading '{}' failed: {}", key, e);
                None
            }
        };
        self.pending.push_back(TransportEvent::Retrieved {
            key: key.to_string(),
            value,
        });
    }

    fn set(&mut self, key: &str, value: Value) {
        if let Err(e) = self.store.put(key, &value) {
            error!("local world: writing '{}' failed: {}", key, e);
        }
    }

    fn story_complete(&mut self) {
        info!("local world: goal complete for slot {}", self.slot);
        let key = format!("{}_goal", self.private_key_prefix());
        if let Err(e) = self.store.put(&key, &Value::Bool(true)) {
            error!("local world: could not record goal: {}", e);
        }
    }

    fn data_package_synced(&self) -> bool {
        true
    }

    fn private_key_prefix(&self) -> String {
        slot_key_prefix(&self.slot)
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        if self.closed {
            return Vec::new();
        }
        if !self.announced {
            self.announce();
        }
        self.pending.drain(..).collect()
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.pending.clear();
        debug!("local world transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn world() -> LocalWorld {
        LocalWorld::from_json_str(
            &json!({
                "slot_data": {"locations": [3, 4]},
                "placements": {"3": 12, "4": 5},
                "flags": {"3": 1}
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn slot_data_arrives_on_first_poll_only() {
        let dir = TempDir::new().unwrap();
        let mut t = LocalTransport::new(world(), SaveStore::open(dir.path()).unwrap(), 1, "p1");
        let first = t.poll();
        assert_eq!(first.len(), 1);
        assert!(matches!(&first[0], TransportEvent::SlotData { key, .. } if key == "locations"));
        assert!(t.poll().is_empty());
    }

    #[test]
    fn check_grants_placed_item_once_and_persists() {
        let dir = TempDir::new().unwrap();
        let loc = NetId::compose(3, 1);
        {
            let mut t = LocalTransport::new(world(), SaveStore::open(dir.path()).unwrap(), 1, "p1");
            t.poll();
            t.send_location_checks(&[loc]);
            t.send_location_checks(&[loc]);
            let events = t.poll();
            assert_eq!(
                events,
                vec![
                    TransportEvent::LocationChecked(loc),
                    TransportEvent::ItemReceived {
                        item: NetId::compose(12, 1),
                        notify: true
                    },
                ]
            );
        }
        let mut t = LocalTransport::new(world(), SaveStore::open(dir.path()).unwrap(), 1, "p1");
        let events = t.poll();
        assert!(events.contains(&TransportEvent::LocationChecked(loc)));
    }

    #[test]
    fn scouts_answer_from_placements() {
        let dir = TempDir::new().unwrap();
        let mut t = LocalTransport::new(world(), SaveStore::open(dir.path()).unwrap(), 1, "p1");
        t.poll();
        t.send_scouts(&[NetId::compose(3, 1), NetId::compose(9, 1)]);
        let events = t.poll();
        let TransportEvent::LocationScouted(entries) = &events[0] else {
            panic!("expected scout answer, got {:?}", events);
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item, NetId::compose(12, 1));
        assert_eq!(entries[0].flags, 1);
    }

    #[test]
    fn get_and_set_go_through_the_store() {
        let dir = TempDir::new().unwrap();
        let mut t = LocalTransport::new(world(), SaveStore::open(dir.path()).unwrap(), 1, "p1");
        t.poll();
        t.request_get("local_p1_save_data");
        t.set("local_p1_save_data", json!({"items": {}}));
        t.request_get("local_p1_save_data");
        let events = t.poll();
        assert_eq!(
            events,
            vec![
                TransportEvent::Retrieved {
                    key: "local_p1_save_data".into(),
                    value: None
                },
                TransportEvent::Retrieved {
                    key: "local_p1_save_data".into(),
                    value: Some(json!({"items": {}}))
                },
            ]
        );
    }
}
