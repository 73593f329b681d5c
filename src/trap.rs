//! Trap scheduler: per-trap countdown, grace and pending-trigger state machine.
//!
//! One call to [`advance`] is one game tick. For each tracked trap id:
//! an active trap counts down; on its last tick it switches off and starts its
//! grace period; an inactive trap burns grace first and, once grace is gone and
//! triggers are pending, activates again. A trap is never active twice at once
//! and consecutive activations are always separated by at least one idle tick.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::catalog::{ItemCatalog, ItemKind};
use crate::ids::NetId;
use crate::progress::TrapState;

/// One active trap on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapTick {
    pub item: NetId,
    pub trap: String,
    /// True only on the tick the trap activated.
    pub triggered: bool,
}

/// Advance every trap by one tick. Returns the traps that are active this tick and
/// whether any pending trigger count changed (which needs persisting).
pub fn advance(traps: &mut BTreeMap<NetId, TrapState>, catalog: &ItemCatalog) -> (Vec<TrapTick>, bool) {
    let mut active = Vec::new();
    let mut consumed = false;
    for (id, state) in traps.iter_mut() {
        let Some(ItemKind::Trap {
            trap,
            duration,
            grace,
        }) = catalog.get(*id).map(|d| &d.kind)
        else {
            if state.count > 0 || state.is_active() {
                warn!("trap state for {} has no trap definition, leaving it idle", id);
            }
            continue;
        };

        let mut triggered = false;
        if state.remaining > 1 {
            state.remaining -= 1;
        } else if state.remaining == 1 {
            state.remaining = 0;
            state.grace = *grace;
            debug!("trap {} ({}) finished, grace {}", trap, id, grace);
            continue;
        } else {
            if state.grace > 0 {
                state.grace -= 1;
            }
            if state.grace == 0 && state.count > 0 {
                state.remaining = (*duration).max(1);
                state.count -= 1;
                triggered = true;
                consumed = true;
                debug!("trap {} ({}) triggered, {} pending", trap, id, state.count);
            }
        }

        if state.is_active() {
            active.push(TrapTick {
                item: *id,
                trap: trap.clone(),
                triggered,
            });
        }
    }
    (active, consumed)
}
