//! Outbound seam towards the game engine: player-facing notifications, trap
//! effects and the victory hook.

use log::info;

use crate::catalog::ItemDefinition;
use crate::ids::NetId;

pub trait EffectSink {
    /// A received item should be announced to the player.
    fn notify_item(&mut self, item: &ItemDefinition, id: NetId);

    /// Called once per tick while a trap is active. `triggered` is true only on the
    /// tick the trap activates.
    fn trap_effect(&mut self, trap: &str, triggered: bool);

    /// All goals met. Called at most once per process.
    fn victory(&mut self);
}

/// Effect sink that only writes to the log. Used by the CLI.
#[derive(Debug, Default)]
pub struct LogEffects {
    pub announced: u64,
}

impl EffectSink for LogEffects {
    fn notify_item(&mut self, item: &ItemDefinition, id: NetId) {
        self.announced += 1;
        let name = if item.name.is_empty() {
            id.to_string()
        } else {
            item.name.clone()
        };
        info!("Received {} ({})", name, item.kind.type_name());
    }

    fn trap_effect(&mut self, trap: &str, triggered: bool) {
        if triggered {
            info!("Trap sprung: {}", trap);
        } else {
            log::trace!("trap {} active", trap);
        }
    }

    fn victory(&mut self) {
        info!("All goals complete!");
    }
}
