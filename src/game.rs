//! Static game configuration: per-level location definitions and the item catalog.
//!
//! ```json
//! {
//!   "game_id": 1,
//!   "locations": {
//!     "E1L1": {
//!       "sprites": { "112": { "id": 3 } },
//!       "sectors": { "40": { "id": 17 } },
//!       "exits":   { "normal": { "id": 30 } }
//!     }
//!   },
//!   "items": { "1": { "type": "weapon", "weapon": "pistol" } }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::{info, warn};
use serde_json::Value;

use crate::catalog::{parse_definitions, ItemCatalog, ItemDefinition};
use crate::errors::CoreError;
use crate::ids::{LocationId, NetId, GAME_ID_MASK};
use crate::location::LocationCategory;

/// Entity key (sprite index, sector index or exit tag) to short location id, for one level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelLocations {
    pub sprites: BTreeMap<String, LocationId>,
    pub sectors: BTreeMap<String, LocationId>,
    pub exits: BTreeMap<String, LocationId>,
}

impl LevelLocations {
    fn from_value(level: &str, value: &Value) -> Self {
        Self {
            sprites: section(level, "sprites", value.get("sprites")),
            sectors: section(level, "sectors", value.get("sectors")),
            exits: section(level, "exits", value.get("exits")),
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len() + self.sectors.len() + self.exits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn section(level: &str, name: &str, value: Option<&Value>) -> BTreeMap<String, LocationId> {
    let mut out = BTreeMap::new();
    let Some(entries) = value.and_then(Value::as_object) else {
        return out;
    };
    for (key, entry) in entries {
        // Entries without an integer id (or with a negative one) are engine
        // objects that are deliberately not locations.
        let Some(raw) = entry.get("id").and_then(Value::as_i64) else {
            continue;
        };
        if raw < 0 {
            continue;
        }
        let id = LocationId::from_raw(raw);
        if !id.is_valid() {
            warn!("{} {} {}: location id {} out of range, dropped", level, name, key, raw);
            continue;
        }
        out.insert(key.clone(), id);
    }
    out
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub game_id: u8,
    pub levels: BTreeMap<String, LevelLocations>,
    pub items: HashMap<NetId, ItemDefinition>,
}

impl GameConfig {
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let Some(obj) = value.as_object() else {
            return Err(CoreError::Config("game config must be a JSON object".into()));
        };
        let game_id = obj
            .get("game_id")
            .and_then(Value::as_u64)
            .map(|g| (g & GAME_ID_MASK as u64) as u8)
            .unwrap_or(0);
        if game_id == 0 {
            return Err(CoreError::Disabled("game config has no game_id".into()));
        }

        let levels = obj
            .get("locations")
            .and_then(Value::as_object)
            .map(|levels| {
                levels
                    .iter()
                    .map(|(name, v)| (name.clone(), LevelLocations::from_value(name, v)))
                    .collect()
            })
            .unwrap_or_default();

        let items = match obj.get("items").and_then(Value::as_object) {
            Some(raw) => parse_definitions(raw, game_id),
            None => {
                warn!("game config has no items table");
                HashMap::new()
            }
        };

        Ok(Self {
            game_id,
            levels,
            items,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_json_str(&text)?;
        info!(
            "loaded game config {} (game id {}, {} levels, {} items)",
            path.as_ref().display(),
            config.game_id,
            config.levels.len(),
            config.items.len()
        );
        Ok(config)
    }

    /// Every (location, category) pair across all levels, for configuring the location table.
    pub fn location_defs(&self) -> Vec<(LocationId, LocationCategory)> {
        let mut defs = Vec::new();
        for level in self.levels.values() {
            defs.extend(level.sprites.values().map(|id| (*id, LocationCategory::Pickup)));
            defs.extend(level.sectors.values().map(|id| (*id, LocationCategory::Secret)));
            defs.extend(level.exits.values().map(|id| (*id, LocationCategory::Exit)));
        }
        defs
    }

    pub fn catalog(&self) -> ItemCatalog {
        ItemCatalog::new(self.items.clone())
    }

    pub fn location_for_sprite(&self, level: &str, sprite: usize) -> Option<LocationId> {
        self.levels.get(level)?.sprites.get(&sprite.to_string()).copied()
    }

    pub fn location_for_sector(&self, level: &str, sector: usize) -> Option<LocationId> {
        self.levels.get(level)?.sectors.get(&sector.to_string()).copied()
    }

    pub fn location_for_exit(&self, level: &str, tag: &str) -> Option<LocationId> {
        self.levels.get(level)?.exits.get(tag).copied()
    }

    pub fn net_location(&self, loc: LocationId) -> NetId {
        NetId::location(loc, self.game_id)
    }
}
