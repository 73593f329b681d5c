//! Item catalog: strongly typed item definitions keyed by network id.
//!
//! Definitions arrive as loosely typed JSON from the static game configuration
//! (and optionally from slot settings as per-item overrides). They are parsed
//! once into [`ItemDefinition`] records; anything that fails to parse is logged
//! and skipped so one malformed entry never takes the catalog down.

use std::collections::{BTreeSet, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::NetId;

/// Named capabilities that slot settings may lock until the matching item arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Crouch,
    Jump,
    Dive,
    Run,
    Open,
    Use,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Crouch,
        Ability::Jump,
        Ability::Dive,
        Ability::Run,
        Ability::Open,
        Ability::Use,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Ability::Crouch => "crouch",
            Ability::Jump => "jump",
            Ability::Dive => "dive",
            Ability::Run => "run",
            Ability::Open => "open",
            Ability::Use => "use",
        }
    }

    /// Parse from a string (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
    }
}

fn default_trap_duration() -> u32 {
    1
}

/// Type-specific part of an item definition, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Each grant advances a chain; the n-th grant applies `items[min(len, n) - 1]`.
    Progressive { items: Vec<NetId> },
    /// Access key. `level` restricts it to one level; absent means every level.
    Key {
        key: String,
        #[serde(default)]
        level: Option<String>,
    },
    Automap { level: String },
    /// Unlocks a level for the episode/level select.
    Level { level: String },
    Weapon {
        weapon: String,
        #[serde(default)]
        ammo: u32,
        /// Minimum ammo capacity granted together with the weapon.
        #[serde(default)]
        capacity: u32,
    },
    Ammo {
        weapon: String,
        #[serde(default)]
        amount: u32,
        #[serde(default)]
        capacity: u32,
        #[serde(default)]
        max_capacity: Option<u32>,
    },
    Inventory {
        slot: String,
        #[serde(default)]
        amount: u32,
        #[serde(default)]
        capacity: u32,
    },
    #[serde(rename = "invcapacity")]
    InvCapacity {
        slot: String,
        #[serde(default)]
        capacity: u32,
        #[serde(default)]
        max_capacity: Option<u32>,
    },
    Ability { ability: Ability },
    Health {
        #[serde(default)]
        amount: u32,
        #[serde(default)]
        capacity: u32,
        #[serde(default)]
        max_capacity: Option<u32>,
    },
    Armor {
        #[serde(default)]
        amount: u32,
        #[serde(default)]
        capacity: u32,
        #[serde(default)]
        max_capacity: Option<u32>,
    },
    Trap {
        trap: String,
        #[serde(default = "default_trap_duration")]
        duration: u32,
        #[serde(default)]
        grace: u32,
    },
    Filler,
}

impl ItemKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Progressive { .. } => "progressive",
            ItemKind::Key { .. } => "key",
            ItemKind::Automap { .. } => "automap",
            ItemKind::Level { .. } => "level",
            ItemKind::Weapon { .. } => "weapon",
            ItemKind::Ammo { .. } => "ammo",
            ItemKind::Inventory { .. } => "inventory",
            ItemKind::InvCapacity { .. } => "invcapacity",
            ItemKind::Ability { .. } => "ability",
            ItemKind::Health { .. } => "health",
            ItemKind::Armor { .. } => "armor",
            ItemKind::Trap { .. } => "trap",
            ItemKind::Filler => "filler",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    #[serde(default)]
    pub name: String,
    /// Owned count survives across sessions in the remote snapshot.
    #[serde(default)]
    pub persistent: bool,
    /// Owned count is capped at 1.
    #[serde(default)]
    pub unique: bool,
    /// Never surfaced to the player, even when the grant asks to notify.
    #[serde(default)]
    pub silent: bool,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl ItemDefinition {
    /// Parse one definition and namespace any id references it carries.
    /// Unknown fields are reported but do not reject the record.
    pub fn from_value(raw: &Value, game_id: u8) -> Result<Self, serde_json::Error> {
        let mut def: ItemDefinition = serde_json::from_value(raw.clone())?;
        if let ItemKind::Progressive { items } = &mut def.kind {
            for id in items.iter_mut() {
                *id = NetId::normalize(id.0, game_id);
            }
        }
        for field in unknown_fields(raw, &def) {
            warn!(
                "item '{}' ({}): ignoring unknown field '{}'",
                def.name,
                def.kind.type_name(),
                field
            );
        }
        Ok(def)
    }
}

fn unknown_fields(raw: &Value, def: &ItemDefinition) -> Vec<String> {
    let (Some(raw), Ok(Value::Object(known))) = (raw.as_object(), serde_json::to_value(def)) else {
        return Vec::new();
    };
    raw.keys()
        .filter(|k| !known.contains_key(k.as_str()))
        .cloned()
        .collect()
}

/// Parse a `{id: definition}` map. Keys may be short or full network ids.
pub fn parse_definitions(raw: &Map<String, Value>, game_id: u8) -> HashMap<NetId, ItemDefinition> {
    let mut out = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Ok(id) = key.trim().parse::<i64>() else {
            warn!("item catalog: skipping non-numeric item id '{}'", key);
            continue;
        };
        match ItemDefinition::from_value(value, game_id) {
            Ok(def) => {
                out.insert(NetId::normalize(id, game_id), def);
            }
            Err(e) => warn!("item catalog: skipping item {}: {}", key, e),
        }
    }
    out
}

/// Immutable item table plus the slot-specific override overlay.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<NetId, ItemDefinition>,
    overlay: HashMap<NetId, ItemDefinition>,
}

impl ItemCatalog {
    pub fn new(items: HashMap<NetId, ItemDefinition>) -> Self {
        Self {
            items,
            overlay: HashMap::new(),
        }
    }

    /// Replace the override layer. Lookups prefer overlay entries.
    pub fn set_overlay(&mut self, overlay: HashMap<NetId, ItemDefinition>) {
        self.overlay = overlay;
    }

    pub fn get(&self, id: NetId) -> Option<&ItemDefinition> {
        self.overlay.get(&id).or_else(|| self.items.get(&id))
    }

    pub fn contains(&self, id: NetId) -> bool {
        self.overlay.contains_key(&id) || self.items.contains_key(&id)
    }

    /// All known ids, base and overlay, in ascending order.
    pub fn ids(&self) -> BTreeSet<NetId> {
        self.items.keys().chain(self.overlay.keys()).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.overlay.is_empty()
    }
}
