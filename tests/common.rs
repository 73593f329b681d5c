//! Test utilities & fixtures: a scripted transport, a recording effect sink and
//! a small game configuration shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use mwsync::catalog::ItemDefinition;
use mwsync::effects::EffectSink;
use mwsync::game::GameConfig;
use mwsync::ids::NetId;
use mwsync::session::Session;
use mwsync::sync::SyncOptions;
use mwsync::transport::{Transport, TransportEvent};
use serde_json::{json, Value};

pub const GAME: u8 = 1;

pub fn id(short: i64) -> NetId {
    NetId::compose(short, GAME)
}

/// Items: 1 shotgun, 2 shells, 3 blue key (E1L2), 4 medkit, 5 progressive weapon
/// (shotgun then chaingun), 6 chaingun, 7 freeze trap, 8 jump, 9 filler,
/// 10 E1L2 unlock.
pub fn game_json() -> Value {
    json!({
        "game_id": GAME,
        "locations": {
            "E1L1": {
                "sprites": {"10": {"id": 1}, "11": {"id": 2}},
                "sectors": {"5": {"id": 3}},
                "exits": {"normal": {"id": 4}}
            },
            "E1L2": {
                "sprites": {"1": {"id": 5}}
            }
        },
        "items": {
            "1": {"name": "Shotgun", "type": "weapon", "weapon": "shotgun", "ammo": 8, "capacity": 50, "persistent": true},
            "2": {"name": "Shells", "type": "ammo", "weapon": "shotgun", "amount": 4},
            "3": {"name": "Blue Key (E1L2)", "type": "key", "key": "blue", "level": "E1L2", "persistent": true, "unique": true},
            "4": {"name": "Medkit", "type": "health", "amount": 25},
            "5": {"name": "Progressive Weapon", "type": "progressive", "items": [1, 6], "persistent": true},
            "6": {"name": "Chaingun", "type": "weapon", "weapon": "chaingun", "ammo": 20, "capacity": 200},
            "7": {"name": "Freeze Trap", "type": "trap", "trap": "freeze", "duration": 3, "grace": 1},
            "8": {"name": "Jump", "type": "ability", "ability": "jump", "persistent": true, "unique": true},
            "9": {"name": "Nothing", "type": "filler", "silent": true},
            "10": {"name": "E1L2", "type": "level", "level": "E1L2", "persistent": true, "unique": true}
        }
    })
}

pub fn game() -> GameConfig {
    GameConfig::from_value(&game_json()).expect("fixture game config")
}

/// Slot data for the fixture: every defined location in play, goal is the blue key
/// plus two progressive weapons.
pub fn slot_data() -> Vec<TransportEvent> {
    let mut goal = serde_json::Map::new();
    goal.insert(id(3).0.to_string(), json!(1));
    goal.insert("5".to_string(), json!(2));
    vec![
        TransportEvent::SlotData {
            key: "goal".into(),
            value: Value::Object(goal),
        },
        TransportEvent::SlotData {
            key: "locations".into(),
            value: json!([id(1).0, id(2).0, id(3).0, id(4).0, id(5).0]),
        },
        TransportEvent::SlotData {
            key: "levels".into(),
            value: json!([10]),
        },
        TransportEvent::SlotData {
            key: "settings".into(),
            value: json!({"maximum_health": 100, "lock_jump": true}),
        },
    ]
}

/// Transport double. Answers `request_get` with `snapshot` when `answer_get` is set
/// and records everything the session sends.
#[derive(Default)]
pub struct ScriptedTransport {
    pub inbox: VecDeque<TransportEvent>,
    pub answer_get: bool,
    pub snapshot: Option<Value>,
    pub synced: bool,
    pub checks: Vec<NetId>,
    pub scouts: Vec<NetId>,
    pub gets: Vec<String>,
    pub sets: Vec<(String, Value)>,
    pub story_completes: u32,
    pub shut_down: bool,
}

impl ScriptedTransport {
    pub fn answering(snapshot: Option<Value>) -> Self {
        Self {
            inbox: slot_data().into(),
            answer_get: true,
            snapshot,
            synced: true,
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            inbox: slot_data().into(),
            synced: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: TransportEvent) {
        self.inbox.push_back(event);
    }

    pub fn last_set(&self) -> Option<&Value> {
        self.sets.last().map(|(_, v)| v)
    }
}

impl Transport for ScriptedTransport {
    fn send_location_checks(&mut self, locations: &[NetId]) {
        self.checks.extend_from_slice(locations);
    }

    fn send_scouts(&mut self, locations: &[NetId]) {
        self.scouts.extend_from_slice(locations);
    }

    fn request_get(&mut self, key: &str) {
        self.gets.push(key.to_string());
        if self.answer_get {
            self.inbox.push_back(TransportEvent::Retrieved {
                key: key.to_string(),
                value: self.snapshot.clone(),
            });
        }
    }

    fn set(&mut self, key: &str, value: Value) {
        self.sets.push((key.to_string(), value));
    }

    fn story_complete(&mut self) {
        self.story_completes += 1;
    }

    fn data_package_synced(&self) -> bool {
        self.synced
    }

    fn private_key_prefix(&self) -> String {
        "team0_slot1".to_string()
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        if self.shut_down {
            return Vec::new();
        }
        self.inbox.drain(..).collect()
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[derive(Debug, Default)]
pub struct RecordingEffects {
    pub notified: Vec<NetId>,
    pub traps: Vec<(String, bool)>,
    pub victories: u32,
}

impl EffectSink for RecordingEffects {
    fn notify_item(&mut self, _item: &ItemDefinition, id: NetId) {
        self.notified.push(id);
    }

    fn trap_effect(&mut self, trap: &str, triggered: bool) {
        self.traps.push((trap.to_string(), triggered));
    }

    fn victory(&mut self) {
        self.victories += 1;
    }
}

pub type TestSession = Session<ScriptedTransport, RecordingEffects>;

pub fn fast_options() -> SyncOptions {
    SyncOptions {
        init_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(5),
        flush_debounce_ticks: 1,
    }
}

pub fn session(transport: ScriptedTransport) -> TestSession {
    Session::new(&game(), transport, RecordingEffects::default(), fast_options())
}

/// A session that has connected against an empty save.
pub async fn ready_session() -> TestSession {
    let mut s = session(ScriptedTransport::answering(None));
    s.connect().await.expect("connect");
    s
}
