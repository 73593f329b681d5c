//! The multiworld session: one context object owning every piece of client
//! state, driven by the game's tick loop.
//!
//! Transport events are handled to completion inside [`Session::tick`] (or
//! while [`Session::connect`] waits for the save snapshot). They only enqueue
//! or merge data; items take effect when the queue drains on a tick.

use std::collections::HashSet;

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::applier::Applier;
use crate::catalog::{Ability, ItemCatalog, ItemKind};
use crate::effects::EffectSink;
use crate::errors::CoreError;
use crate::game::GameConfig;
use crate::goal::GoalEvaluator;
use crate::ids::{LocationId, NetId};
use crate::location::LocationTable;
use crate::logutil::{escape_log, preview_list};
use crate::metrics;
use crate::player::{DynamicPlayer, PlayerPools};
use crate::progress::{ProgressStore, SaveData};
use crate::queue::{QueuedItem, ReceiveQueue};
use crate::settings::{parse_id_list, parse_used_levels, GoalSet, SlotSettings};
use crate::sync::{SyncClient, SyncOptions, SyncState};
use crate::trap::{self, TrapTick};
use crate::transport::{Transport, TransportEvent};

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub applied: usize,
    pub traps: Vec<TrapTick>,
    pub victory: bool,
    pub flushed: bool,
}

pub struct Session<T: Transport, E: EffectSink> {
    game_id: u8,
    catalog: ItemCatalog,
    locations: LocationTable,
    settings: SlotSettings,
    progress: ProgressStore,
    queue: ReceiveQueue,
    pools: PlayerPools,
    goals: GoalEvaluator,
    used_levels: HashSet<NetId>,
    sync: SyncClient,
    level: Option<String>,
    ticks_since_capture: u64,
    transport: T,
    effects: E,
}

impl<T: Transport, E: EffectSink> Session<T, E> {
    pub fn new(game: &GameConfig, transport: T, effects: E, options: SyncOptions) -> Self {
        let mut locations = LocationTable::new();
        locations.configure(game.location_defs());
        let settings = SlotSettings::default();
        let pools = PlayerPools::baseline(&settings);
        Self {
            game_id: game.game_id,
            catalog: game.catalog(),
            locations,
            settings,
            progress: ProgressStore::new(),
            queue: ReceiveQueue::new(),
            pools,
            goals: GoalEvaluator::default(),
            used_levels: HashSet::new(),
            sync: SyncClient::new(options),
            level: None,
            ticks_since_capture: 0,
            transport,
            effects,
        }
    }

    /// Request the save snapshot and wait until it has been merged and the data
    /// package is synced. On timeout the transport is shut down and nothing of
    /// the partial state is written back.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = *self.sync.options();
        self.sync.begin(&mut self.transport);
        let mut interval = tokio::time::interval(options.poll_interval);
        let wait = async {
            loop {
                interval.tick().await;
                self.pump();
                if self.sync.is_ready() {
                    break;
                }
            }
        };
        let outcome = tokio::time::timeout(options.init_timeout, wait).await;
        if outcome.is_err() {
            let waited_ms = options.init_timeout.as_millis() as u64;
            error!(
                "no save snapshot after {}ms (data package synced: {}), giving up",
                waited_ms,
                self.transport.data_package_synced()
            );
            self.sync.fail();
            self.transport.shutdown();
            return Err(CoreError::Timeout {
                what: "save snapshot",
                waited_ms,
            });
        }
        info!(
            "session ready: {} locations in play, {} items owned",
            self.locations.used_count(),
            self.progress.owned().len()
        );
        Ok(())
    }

    /// Handle everything the transport has delivered since the last call.
    pub fn pump(&mut self) {
        for event in self.transport.poll() {
            self.handle_event(event);
        }
        if self.sync.state() == SyncState::WaitingForSnapshot
            && self.sync.snapshot_received()
            && self.transport.data_package_synced()
        {
            self.sync.mark_ready();
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ItemReceived { item, notify } => {
                self.enqueue_item(item, notify);
            }
            TransportEvent::LocationChecked(net) => {
                self.location_checked_elsewhere(net);
            }
            TransportEvent::LocationScouted(entries) => {
                self.locations.apply_scout_result(&entries);
            }
            TransportEvent::LocationHinted(entries) => {
                for entry in &entries {
                    self.locations.mark_hinted(entry.location.short(), entry.item);
                }
                debug!("{} locations hinted", entries.len());
            }
            TransportEvent::SlotData { key, value } => self.apply_slot_data(&key, &value),
            TransportEvent::Retrieved { key, value } => {
                if let Some(snapshot) = self.sync.on_retrieved(&key, value) {
                    self.import_snapshot(&snapshot);
                }
            }
            TransportEvent::ItemsCleared => {
                info!("service cleared received items, resetting inventory");
                self.queue.clear();
                self.progress.clear_items();
                self.recompute();
            }
            TransportEvent::Message(text) => info!("[server] {}", escape_log(&text)),
        }
    }

    fn apply_slot_data(&mut self, key: &str, value: &Value) {
        match key {
            "goal" => {
                let goals = GoalSet::from_value(value, self.game_id);
                info!("slot data: {} goal requirements", goals.len());
                self.goals.set_goals(goals);
            }
            "locations" => {
                let ids: Vec<NetId> = parse_id_list(value, "locations")
                    .into_iter()
                    .map(|id| NetId::normalize(id.0, self.game_id))
                    .collect();
                let accepted = self.locations.mark_used(&ids);
                info!(
                    "slot data: {} of {} locations in play",
                    accepted.len(),
                    ids.len()
                );
                if !accepted.is_empty() {
                    debug!("scouting {}", preview_list(&accepted, 8));
                    self.transport.send_scouts(&accepted);
                }
            }
            "levels" => {
                self.used_levels = parse_used_levels(value, self.game_id);
                info!("slot data: {} levels in play", self.used_levels.len());
            }
            "settings" => {
                self.settings = SlotSettings::from_value(value);
                self.catalog
                    .set_overlay(self.settings.item_overrides(self.game_id));
                self.recompute();
                self.restore_player();
            }
            other => debug!("slot data: ignoring '{}'", other),
        }
    }

    /// Local gameplay reached a location. Returns true the first time a location in play is checked.
    pub fn check_location(&mut self, loc: LocationId) -> bool {
        if !self.locations.check(loc) {
            return false;
        }
        let net = NetId::location(loc, self.game_id);
        self.transport.send_location_checks(&[net]);
        metrics::inc_checks_sent();
        debug!("checked location {} ({})", loc, net);
        true
    }

    /// Queue a grant. Ids missing from the catalog are dropped here.
    pub fn enqueue_item(&mut self, item: NetId, notify: bool) -> bool {
        if !self.catalog.contains(item) {
            warn!("dropping unknown item {}", item);
            metrics::inc_items_dropped();
            return false;
        }
        self.queue.push(QueuedItem::new(item, notify));
        self.progress.mark_dirty();
        metrics::inc_items_received();
        true
    }

    pub fn location_checked_elsewhere(&mut self, net: NetId) -> bool {
        self.locations.mark_checked_external(net.short())
    }

    /// Switch to a level: rebuild pools for it and put the saved dynamic player back on top.
    pub fn enter_level(&mut self, level: &str) {
        self.level = Some(level.to_string());
        self.recompute();
        self.restore_player();
        info!("entered level {}", level);
    }

    fn recompute(&mut self) {
        Applier {
            catalog: &self.catalog,
            settings: &self.settings,
            progress: &mut self.progress,
            pools: &mut self.pools,
            level: self.level.as_deref(),
        }
        .recompute_from_persistent();
    }

    fn restore_player(&mut self) {
        DynamicPlayer::from_blob(self.progress.player()).restore(&mut self.pools, &self.settings);
    }

    /// One discrete game step: pump the transport, drain the queue, advance
    /// traps, evaluate the goal and flush when due. Nothing past the pump runs
    /// before the save snapshot is merged.
    pub fn tick(&mut self) -> TickReport {
        self.pump();
        let mut report = TickReport::default();
        if !self.sync.is_ready() {
            return report;
        }
        self.ticks_since_capture = self.ticks_since_capture.saturating_add(1);

        report.applied = Applier {
            catalog: &self.catalog,
            settings: &self.settings,
            progress: &mut self.progress,
            pools: &mut self.pools,
            level: self.level.as_deref(),
        }
        .drain(&mut self.queue, &mut self.effects);

        let (active, consumed) = trap::advance(self.progress.traps_mut(), &self.catalog);
        if consumed {
            self.progress.mark_dirty();
        }
        for tick in &active {
            if tick.triggered {
                metrics::inc_traps_triggered();
            }
            self.effects.trap_effect(&tick.trap, tick.triggered);
        }
        report.traps = active;

        let progress = &self.progress;
        if self.goals.check(|id| progress.owned_count(id)) {
            self.transport.story_complete();
            self.effects.victory();
            report.victory = true;
        }

        report.flushed = self
            .sync
            .tick_flush(&mut self.transport, &mut self.progress, &self.queue);
        report
    }

    pub fn owned_count(&self, item: NetId) -> u32 {
        self.progress.owned_count(item)
    }

    pub fn has_item(&self, item: NetId) -> bool {
        self.progress.has_item(item)
    }

    pub fn is_location_used(&self, loc: LocationId) -> bool {
        self.locations.is_used(loc)
    }

    pub fn is_location_checked(&self, loc: LocationId) -> bool {
        self.locations.is_checked(loc)
    }

    pub fn is_location_progression(&self, loc: LocationId) -> bool {
        self.locations.is_progression(loc)
    }

    /// Abilities are unlocked unless the slot locks them and the unlock item has not arrived.
    pub fn ability_unlocked(&self, ability: Ability) -> bool {
        !self.settings.is_locked(ability) || self.pools.abilities.contains(&ability)
    }

    pub fn capability_unlocked(&self, name: &str) -> bool {
        match Ability::from_name(name) {
            Some(ability) => self.ability_unlocked(ability),
            None => {
                debug!("unknown capability '{}', treating as unlocked", name);
                true
            }
        }
    }

    pub fn is_level_used(&self, unlock: NetId) -> bool {
        self.used_levels
            .contains(&NetId::normalize(unlock.0, self.game_id))
    }

    /// Full save blob: owned counts, queued items, pending traps and the dynamic player.
    pub fn export_snapshot(&self) -> Value {
        self.progress.to_save(self.queue.to_vec()).to_value()
    }

    /// Merge a save blob into the live state. Counts add up (unique items stay at 1),
    /// saved queue entries go ahead of anything received since, pending triggers
    /// are kept only for trap items, and a non-null player blob replaces the
    /// current one. Pools are rebuilt afterwards.
    pub fn import_snapshot(&mut self, snapshot: &Value) {
        let save = SaveData::from_value(snapshot);
        for (id, count) in &save.items {
            match self.catalog.get(*id) {
                Some(def) if def.persistent => {
                    self.progress.add_owned(*id, *count, def.unique);
                }
                Some(_) => debug!("save: {} is not persistent, skipped", id),
                None => warn!("save: unknown item {} skipped", id),
            }
        }
        let catalog = &self.catalog;
        let saved: Vec<QueuedItem> = save
            .queue
            .into_iter()
            .filter(|entry| catalog.contains(entry.item_id))
            .collect();
        self.queue.prepend(saved);
        for (id, count) in &save.traps {
            match self.catalog.get(*id).map(|def| &def.kind) {
                Some(ItemKind::Trap { .. }) => self.progress.add_trap_trigger(*id, *count),
                Some(_) => warn!("save: {} is not a trap, dropping {} pending triggers", id, count),
                None => warn!("save: unknown trap {} dropped", id),
            }
        }
        if !save.player.is_null() {
            self.progress.set_player(save.player);
        }
        metrics::inc_snapshot_imports();
        self.recompute();
        self.restore_player();
        info!(
            "imported save: {} item ids, {} queued",
            save.items.len(),
            self.queue.len()
        );
    }

    /// Write the current non-derivable player values into the dynamic player blob.
    pub fn capture_player(&mut self) {
        let mut player = DynamicPlayer::from_blob(self.progress.player());
        player.capture(&self.pools);
        player.elapsed_ticks = player.elapsed_ticks.saturating_add(self.ticks_since_capture);
        self.ticks_since_capture = 0;
        self.progress.set_player(player.to_blob());
    }

    /// Best-effort final flush, then close the transport.
    pub fn shutdown(&mut self) {
        self.sync
            .shutdown_flush(&mut self.transport, &mut self.progress, &self.queue);
        self.transport.shutdown();
        info!("session closed");
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn current_level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    pub fn pools(&self) -> &PlayerPools {
        &self.pools
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    pub fn settings(&self) -> &SlotSettings {
        &self.settings
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn goal_reached(&self) -> bool {
        self.goals.reached()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }
}
