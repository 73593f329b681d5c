//! Receive-queue drain and item application.
//!
//! Live grants run every effect of an item at once. Rebuilding inventory from
//! persistent counts runs in two passes instead: first every structural effect
//! (ownership, maxima, capacities, unlocks) for all items, then every amount
//! (ammo, health, inventory fill) against the final limits. Splitting the
//! passes keeps the rebuilt pools independent of item id order.

use std::collections::HashSet;

use log::{debug, warn};

use crate::catalog::{ItemCatalog, ItemKind};
use crate::effects::EffectSink;
use crate::ids::NetId;
use crate::metrics;
use crate::player::PlayerPools;
use crate::progress::ProgressStore;
use crate::queue::ReceiveQueue;
use crate::settings::SlotSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Live,
    Structure,
    Amounts,
}

impl Phase {
    fn structure(self) -> bool {
        self != Phase::Amounts
    }

    fn amounts(self) -> bool {
        self != Phase::Structure
    }
}

/// Borrowed view over the state an item grant may touch.
pub struct Applier<'a> {
    pub catalog: &'a ItemCatalog,
    pub settings: &'a SlotSettings,
    pub progress: &'a mut ProgressStore,
    pub pools: &'a mut PlayerPools,
    /// Level the player is currently in, for level-scoped keys and automaps.
    pub level: Option<&'a str>,
}

impl<'a> Applier<'a> {
    /// Apply everything queued right now, oldest first. Returns how many grants took effect.
    pub fn drain(&mut self, queue: &mut ReceiveQueue, effects: &mut dyn EffectSink) -> usize {
        let pass = queue.take_pass();
        if pass.is_empty() {
            return 0;
        }
        // The queue itself is part of the save.
        self.progress.mark_dirty();
        let mut applied = 0;
        for entry in pass {
            if self.apply_in(entry.item_id, entry.notify, true, Phase::Live, Some(&mut *effects)) {
                applied += 1;
            }
        }
        metrics::add_items_applied(applied as u64);
        applied
    }

    /// Apply one grant. `is_new` counts it towards persistent ownership.
    pub fn apply(&mut self, id: NetId, notify: bool, is_new: bool, effects: &mut dyn EffectSink) -> bool {
        self.apply_in(id, notify, is_new, Phase::Live, Some(effects))
    }

    /// Reset derived pools to the settings baseline and replay every owned persistent item.
    pub fn recompute_from_persistent(&mut self) {
        *self.pools = PlayerPools::baseline(self.settings);
        let owned = self.progress.owned();
        for phase in [Phase::Structure, Phase::Amounts] {
            // Chains must be walked forward from zero in each pass.
            self.progress.reset_progressive();
            for (id, count) in &owned {
                for _ in 0..*count {
                    self.apply_in(*id, false, false, phase, None);
                }
            }
        }
        debug!(
            "recomputed pools from {} owned item ids (level={:?})",
            owned.len(),
            self.level
        );
    }

    fn apply_in(
        &mut self,
        id: NetId,
        notify: bool,
        is_new: bool,
        phase: Phase,
        mut effects: Option<&mut dyn EffectSink>,
    ) -> bool {
        let catalog = self.catalog;
        let mut current = id;
        let mut is_new = is_new;
        let mut visited = HashSet::new();
        loop {
            let Some(def) = catalog.get(current) else {
                if current == id {
                    warn!("ignoring unknown item {}", id);
                    return false;
                }
                warn!("progressive item {} refers to unknown item {}", id, current);
                return true;
            };
            if !visited.insert(current) {
                warn!("progressive item {} loops back to {}, stopping", id, current);
                return true;
            }
            if is_new && def.persistent {
                let owned = self.progress.grant(current, def.unique);
                debug!("owned {} x{}", current, owned);
            }
            if notify && !def.silent {
                if let Some(fx) = effects.take() {
                    fx.notify_item(def, current);
                }
            }
            match &def.kind {
                ItemKind::Progressive { items } => {
                    let n = self.progress.advance_progressive(current);
                    let Some(index) = items.len().min(n as usize).checked_sub(1) else {
                        debug!("progressive item {} has an empty chain", current);
                        return true;
                    };
                    current = items[index];
                    is_new = false;
                }
                kind => {
                    self.apply_leaf(current, kind, phase);
                    return true;
                }
            }
        }
    }

    fn in_scope(&self, level: Option<&str>) -> bool {
        match level {
            None => true,
            Some(wanted) => self
                .level
                .map(|cur| cur.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        }
    }

    fn apply_leaf(&mut self, id: NetId, kind: &ItemKind, phase: Phase) {
        let structure = phase.structure();
        let amounts = phase.amounts();
        let settings = self.settings;
        match kind {
            ItemKind::Key { key, level } => {
                if !structure {
                    return;
                }
                if self.in_scope(level.as_deref()) {
                    self.pools.keys.insert(key.clone());
                } else {
                    debug!("key {} held until level {:?}", key, level);
                }
            }
            ItemKind::Automap { level } => {
                if structure && self.in_scope(Some(level)) {
                    self.pools.automaps.insert(level.clone());
                }
            }
            ItemKind::Level { level } => {
                if structure {
                    self.pools.unlocked_levels.insert(level.clone());
                }
            }
            ItemKind::Weapon {
                weapon,
                ammo,
                capacity,
            } => {
                if structure {
                    self.pools.give_weapon(weapon, 0, *capacity);
                }
                if amounts {
                    self.pools.give_weapon(weapon, *ammo, 0);
                }
            }
            ItemKind::Ammo {
                weapon,
                amount,
                capacity,
                max_capacity,
            } => {
                if structure {
                    self.pools.give_ammo(weapon, 0, *capacity, *max_capacity);
                }
                if amounts {
                    self.pools.give_ammo(weapon, *amount, 0, None);
                }
            }
            ItemKind::Inventory {
                slot,
                amount,
                capacity,
            } => {
                if structure {
                    self.pools.give_inventory(slot, 0, *capacity);
                }
                if amounts {
                    self.pools.give_inventory(slot, *amount, 0);
                }
            }
            ItemKind::InvCapacity {
                slot,
                capacity,
                max_capacity,
            } => {
                if structure {
                    self.pools
                        .give_inventory_capacity(slot, *capacity, *max_capacity);
                }
            }
            ItemKind::Ability { ability } => {
                if structure {
                    self.pools.abilities.insert(*ability);
                }
            }
            ItemKind::Health {
                amount,
                capacity,
                max_capacity,
            } => {
                if structure {
                    self.pools.give_health(0, *capacity, *max_capacity, settings);
                }
                if amounts {
                    self.pools.give_health(*amount, 0, None, settings);
                }
            }
            ItemKind::Armor {
                amount,
                capacity,
                max_capacity,
            } => {
                if structure {
                    self.pools.give_armor(0, *capacity, *max_capacity);
                }
                if amounts {
                    self.pools.give_armor(*amount, 0, None);
                }
            }
            ItemKind::Trap { .. } => {
                // Pending triggers are saved on their own; replaying would re-arm them.
                if phase == Phase::Live {
                    self.progress.add_trap_trigger(id, 1);
                }
            }
            ItemKind::Filler | ItemKind::Progressive { .. } => {}
        }
    }
}
