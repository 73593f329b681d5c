//! Seam towards the multiworld network client.
//!
//! The wire protocol is not modelled here. A transport only has to provide the
//! outbound primitives below and hand back whatever arrived since the last
//! poll; the session handles each event to completion before the tick goes on.

use serde_json::Value;

use crate::ids::NetId;
use crate::location::ScoutEntry;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An item was granted to this slot.
    ItemReceived { item: NetId, notify: bool },
    /// The service reports a location already resolved.
    LocationChecked(NetId),
    /// Answer to a scout request.
    LocationScouted(Vec<ScoutEntry>),
    /// The player was told which items sit at these locations.
    LocationHinted(Vec<ScoutEntry>),
    /// Named slot data blob (`goal`, `locations`, `levels`, `settings`).
    SlotData { key: String, value: Value },
    /// Reply to `request_get`. `None` when the key does not exist yet.
    Retrieved { key: String, value: Option<Value> },
    /// The service wants the client to forget all received items before resending them.
    ItemsCleared,
    /// Free-form text for the player (chat, server notices).
    Message(String),
}

pub trait Transport {
    fn send_location_checks(&mut self, locations: &[NetId]);

    fn send_scouts(&mut self, locations: &[NetId]);

    /// Ask for a key of the remote data store. The answer arrives as `TransportEvent::Retrieved`.
    fn request_get(&mut self, key: &str);

    /// Full replace of a key in the remote data store.
    fn set(&mut self, key: &str, value: Value);

    fn story_complete(&mut self);

    /// Data package handshake has completed.
    fn data_package_synced(&self) -> bool;

    /// Prefix for keys private to this slot.
    fn private_key_prefix(&self) -> String;

    /// Everything that arrived since the previous call, in arrival order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    fn shutdown(&mut self);
}
