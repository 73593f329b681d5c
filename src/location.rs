//! Location table: fixed-size registry of location flag state.
//!
//! Every slot starts empty when the game configuration loads. Category flags
//! come from the static level definitions, `USED` from the server's active
//! location list, and `CHECKED` is set at most once per location.

use bitflags::bitflags;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::ids::{LocationId, NetId, MAX_LOCATION};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LocationFlags: u32 {
        /// In play for the current seed.
        const USED        = 0x0000_0001;
        const PROGRESSION = 0x0000_0010;
        const IMPORTANT   = 0x0000_0020;
        const TRAP        = 0x0000_0040;
        /// Scouted during startup to learn progression state.
        const SCOUTED     = 0x0000_0100;
        /// The item at this location is logically known to the player.
        const HINTED      = 0x0000_0200;
        const CHECKED     = 0x0000_1000;
        const PICKUP      = 0x0001_0000;
        const SECRET      = 0x0002_0000;
        const EXIT        = 0x0004_0000;
    }
}

/// Scout result flag bits as sent by the multiworld service.
pub const SCOUT_PROGRESSION: u32 = 0b001;
pub const SCOUT_IMPORTANT: u32 = 0b010;
pub const SCOUT_TRAP: u32 = 0b100;

/// Location category assigned from static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    Pickup,
    Secret,
    Exit,
}

impl LocationCategory {
    pub fn flag(self) -> LocationFlags {
        match self {
            LocationCategory::Pickup => LocationFlags::PICKUP,
            LocationCategory::Secret => LocationFlags::SECRET,
            LocationCategory::Exit => LocationFlags::EXIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationState {
    pub flags: LocationFlags,
    /// Item placed here. Only meaningful once scouted or hinted.
    pub item: Option<NetId>,
}

/// One entry of a scout answer: what occupies a location and its classification bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutEntry {
    pub location: NetId,
    pub item: NetId,
    #[serde(default)]
    pub flags: u32,
}

pub struct LocationTable {
    slots: Vec<LocationState>,
}

impl Default for LocationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationTable {
    pub fn new() -> Self {
        Self {
            slots: vec![LocationState::default(); MAX_LOCATION],
        }
    }

    /// Clear every slot, then apply category flags. Out-of-range ids are dropped.
    pub fn configure<I>(&mut self, defs: I)
    where
        I: IntoIterator<Item = (LocationId, LocationCategory)>,
    {
        self.slots.fill(LocationState::default());
        for (id, category) in defs {
            match id.index() {
                Some(idx) => self.slots[idx].flags |= category.flag(),
                None => warn!("location table: ignoring out-of-range location {}", id),
            }
        }
    }

    /// Mark the server's active locations as used. Returns the ids accepted, which
    /// the caller forwards as a scout request.
    pub fn mark_used(&mut self, ids: &[NetId]) -> Vec<NetId> {
        let mut accepted = Vec::with_capacity(ids.len());
        for &net in ids {
            let Some(idx) = net.short().index() else {
                debug!("location table: active location {} out of range", net);
                continue;
            };
            self.slots[idx].flags |= LocationFlags::USED;
            accepted.push(net);
        }
        accepted
    }

    /// Merge a scout answer. Classification bits only ever get added.
    pub fn apply_scout_result(&mut self, entries: &[ScoutEntry]) {
        for entry in entries {
            let Some(idx) = entry.location.short().index() else {
                continue;
            };
            let slot = &mut self.slots[idx];
            slot.item = Some(entry.item);
            slot.flags |= LocationFlags::SCOUTED;
            if entry.flags & SCOUT_PROGRESSION != 0 {
                slot.flags |= LocationFlags::PROGRESSION;
            }
            if entry.flags & SCOUT_IMPORTANT != 0 {
                slot.flags |= LocationFlags::IMPORTANT;
            }
            if entry.flags & SCOUT_TRAP != 0 {
                slot.flags |= LocationFlags::TRAP;
            }
        }
    }

    /// Local gameplay check. Returns true only the first time a used location is checked;
    /// the caller is responsible for forwarding the check to the transport in that case.
    pub fn check(&mut self, loc: LocationId) -> bool {
        if !self.is_used(loc) || self.is_checked(loc) {
            return false;
        }
        if let Some(idx) = loc.index() {
            self.slots[idx].flags |= LocationFlags::CHECKED;
        }
        true
    }

    /// The service reports the location resolved elsewhere. Never notifies anyone.
    pub fn mark_checked_external(&mut self, loc: LocationId) -> bool {
        let Some(idx) = loc.index() else {
            return false;
        };
        let slot = &mut self.slots[idx];
        if slot.flags.contains(LocationFlags::CHECKED) {
            return false;
        }
        slot.flags |= LocationFlags::CHECKED;
        true
    }

    /// Record that the player has been told which item sits at this location.
    pub fn mark_hinted(&mut self, loc: LocationId, item: NetId) {
        if let Some(idx) = loc.index() {
            self.slots[idx].item = Some(item);
            self.slots[idx].flags |= LocationFlags::HINTED;
        }
    }

    fn has_all(&self, loc: LocationId, mask: LocationFlags) -> bool {
        loc.index()
            .map(|idx| self.slots[idx].flags.contains(mask))
            .unwrap_or(false)
    }

    pub fn is_used(&self, loc: LocationId) -> bool {
        self.has_all(loc, LocationFlags::USED)
    }

    pub fn is_checked(&self, loc: LocationId) -> bool {
        self.has_all(loc, LocationFlags::USED | LocationFlags::CHECKED)
    }

    pub fn is_progression(&self, loc: LocationId) -> bool {
        self.has_all(loc, LocationFlags::USED | LocationFlags::PROGRESSION)
    }

    pub fn state(&self, loc: LocationId) -> Option<LocationState> {
        loc.index().map(|idx| self.slots[idx])
    }

    /// Known item at a location, only once scouted or hinted.
    pub fn known_item(&self, loc: LocationId) -> Option<NetId> {
        let state = self.state(loc)?;
        if state
            .flags
            .intersects(LocationFlags::SCOUTED | LocationFlags::HINTED)
        {
            state.item
        } else {
            None
        }
    }

    pub fn used_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.flags.contains(LocationFlags::USED))
            .count()
    }

    pub fn checked_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.flags.contains(LocationFlags::USED | LocationFlags::CHECKED))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(short: i64) -> NetId {
        NetId::compose(short, 1)
    }

    #[test]
    fn configure_resets_and_assigns_categories() {
        let mut table = LocationTable::new();
        table.mark_used(&[net(3)]);
        table.configure(vec![
            (LocationId(3), LocationCategory::Pickup),
            (LocationId(4), LocationCategory::Secret),
            (LocationId(5000), LocationCategory::Exit),
        ]);
        let three = table.state(LocationId(3)).unwrap();
        assert_eq!(three.flags, LocationFlags::PICKUP);
        assert!(!table.is_used(LocationId(3)));
        assert!(table
            .state(LocationId(4))
            .unwrap()
            .flags
            .contains(LocationFlags::SECRET));
    }

    #[test]
    fn check_requires_used_and_is_one_shot() {
        let mut table = LocationTable::new();
        assert!(!table.check(LocationId(7)));
        table.mark_used(&[net(7)]);
        assert!(table.check(LocationId(7)));
        assert!(!table.check(LocationId(7)));
        assert!(table.is_checked(LocationId(7)));
        assert_eq!(table.checked_count(), 1);
    }

    #[test]
    fn external_check_is_idempotent_and_requires_used_to_count() {
        let mut table = LocationTable::new();
        assert!(table.mark_checked_external(LocationId(9)));
        assert!(!table.mark_checked_external(LocationId(9)));
        // Not in play, so not considered resolved.
        assert!(!table.is_checked(LocationId(9)));
        table.mark_used(&[net(9)]);
        assert!(table.is_checked(LocationId(9)));
        assert!(!table.check(LocationId(9)));
    }

    #[test]
    fn scout_sets_independent_flags() {
        let mut table = LocationTable::new();
        table.mark_used(&[net(1), net(2)]);
        table.apply_scout_result(&[
            ScoutEntry {
                location: net(1),
                item: NetId(42),
                flags: SCOUT_PROGRESSION | SCOUT_TRAP,
            },
            ScoutEntry {
                location: net(2),
                item: NetId(43),
                flags: SCOUT_IMPORTANT,
            },
        ]);
        let one = table.state(LocationId(1)).unwrap().flags;
        assert!(one.contains(LocationFlags::PROGRESSION | LocationFlags::TRAP));
        assert!(!one.contains(LocationFlags::IMPORTANT));
        assert!(table.is_progression(LocationId(1)));
        assert!(!table.is_progression(LocationId(2)));
        assert_eq!(table.known_item(LocationId(2)), Some(NetId(43)));
    }

    #[test]
    fn hints_reveal_without_scouting() {
        let mut table = LocationTable::new();
        assert_eq!(table.known_item(LocationId(4)), None);
        table.mark_hinted(LocationId(4), NetId(77));
        let four = table.state(LocationId(4)).unwrap().flags;
        assert!(four.contains(LocationFlags::HINTED));
        assert!(!four.contains(LocationFlags::SCOUTED));
        assert_eq!(table.known_item(LocationId(4)), Some(NetId(77)));
    }

    #[test]
    fn mark_used_skips_out_of_range() {
        let mut table = LocationTable::new();
        let accepted = table.mark_used(&[net(1), NetId(0xB17D_0000 | 0x3FF)]);
        assert_eq!(accepted, vec![net(1)]);
        assert_eq!(table.used_count(), 1);
    }
}
