//! Location and item identifiers.
//!
//! Locations are addressed locally by a short id that fits the engine's 16-bit
//! tag fields. On the wire every location and item is a 64-bit [`NetId`]
//! namespaced by a build-wide prefix and the configured game id, so several
//! games sharing one multiworld never collide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix for all item and location ids of this engine family.
pub const BUILD_ID_PREFIX: i64 = 0xB17D_0000;
/// Mask selecting the short location/item id out of a [`NetId`].
pub const LOCATION_MASK: i64 = 0x3FF;
/// Number of addressable location slots. Valid short ids are `0..MAX_LOCATION`.
pub const MAX_LOCATION: usize = LOCATION_MASK as usize;
pub const GAME_ID_MASK: u8 = 0x3F;
pub const GAME_ID_SHIFT: u32 = 10;

/// Short location id as stored in engine tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub i16);

impl LocationId {
    pub fn is_valid(self) -> bool {
        self.0 >= 0 && (self.0 as usize) < MAX_LOCATION
    }

    /// Slot index into the location table, if the id is in range.
    pub fn index(self) -> Option<usize> {
        self.is_valid().then_some(self.0 as usize)
    }

    /// Build a short id from any integer config value. Negative values and values
    /// beyond the mask are kept as-is so callers can reject them with `is_valid`.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 || raw > i16::MAX as i64 {
            LocationId(-1)
        } else {
            LocationId(raw as i16)
        }
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network id of an item or location as used by the multiworld service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetId(pub i64);

impl NetId {
    /// Namespace a short id for the given game.
    pub fn compose(short: i64, game_id: u8) -> Self {
        NetId(
            (short & LOCATION_MASK)
                | (((game_id & GAME_ID_MASK) as i64) << GAME_ID_SHIFT)
                | BUILD_ID_PREFIX,
        )
    }

    /// Accept either a short id or an already-namespaced one. Values that fit the
    /// location mask are treated as short.
    pub fn normalize(raw: i64, game_id: u8) -> Self {
        if (0..=LOCATION_MASK).contains(&raw) {
            Self::compose(raw, game_id)
        } else {
            NetId(raw)
        }
    }

    pub fn short(self) -> LocationId {
        LocationId((self.0 & LOCATION_MASK) as i16)
    }

    pub fn location(short: LocationId, game_id: u8) -> Self {
        Self::compose(short.0 as i64, game_id)
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}
