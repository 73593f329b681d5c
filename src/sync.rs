//! Remote save synchronisation: startup snapshot gate and debounced write-back.
//!
//! ```text
//! Uninitialized --begin--> WaitingForSnapshot --snapshot merged--> Ready
//!                                   |
//!                                   +--deadline passed--> Failed
//! ```
//!
//! Nothing is written back before `Ready`, so the authoritative snapshot is
//! always merged before the first flush.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;

use crate::metrics;
use crate::progress::ProgressStore;
use crate::queue::ReceiveQueue;
use crate::transport::Transport;

pub const SAVE_KEY_SUFFIX: &str = "_save_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    WaitingForSnapshot,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Hard ceiling on the startup snapshot wait.
    pub init_timeout: Duration,
    /// Sleep between transport polls while waiting.
    pub poll_interval: Duration,
    /// Ticks between two flushes of a dirty store. Zero flushes every tick.
    pub flush_debounce_ticks: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(100),
            flush_debounce_ticks: 35,
        }
    }
}

#[derive(Debug)]
pub struct SyncClient {
    state: SyncState,
    key: String,
    options: SyncOptions,
    snapshot_received: bool,
    ticks_since_flush: u32,
}

impl SyncClient {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            state: SyncState::Uninitialized,
            key: String::new(),
            options,
            snapshot_received: false,
            ticks_since_flush: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SyncState::Ready
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Private save key for this slot. Empty before `begin`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Issue the snapshot read. Calling it again while waiting is a no-op.
    pub fn begin<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if self.state != SyncState::Uninitialized {
            return;
        }
        self.key = format!("{}{}", transport.private_key_prefix(), SAVE_KEY_SUFFIX);
        transport.request_get(&self.key);
        self.state = SyncState::WaitingForSnapshot;
        info!("requested save snapshot '{}'", self.key);
    }

    /// Filter a retrieved key. Returns the snapshot to merge when `key` is ours and
    /// it is the first answer; a missing key yields `Value::Null` (fresh save).
    pub fn on_retrieved(&mut self, key: &str, value: Option<Value>) -> Option<Value> {
        if key != self.key || self.state != SyncState::WaitingForSnapshot {
            debug!("ignoring retrieved key '{}'", key);
            return None;
        }
        if self.snapshot_received {
            return None;
        }
        self.snapshot_received = true;
        Some(value.unwrap_or(Value::Null))
    }

    pub fn snapshot_received(&self) -> bool {
        self.snapshot_received
    }

    /// Open the write-back gate. Only valid once the snapshot has been merged.
    pub fn mark_ready(&mut self) {
        if self.state == SyncState::WaitingForSnapshot && self.snapshot_received {
            self.state = SyncState::Ready;
            self.ticks_since_flush = 0;
            info!("save sync ready");
        }
    }

    pub fn fail(&mut self) {
        self.state = SyncState::Failed;
    }

    /// Write the full store back when dirty. Cheap when clean; never writes before `Ready`.
    pub fn flush_if_dirty<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        progress: &mut ProgressStore,
        queue: &ReceiveQueue,
    ) -> bool {
        if !self.is_ready() || !progress.is_dirty() {
            return false;
        }
        let save = progress.to_save(queue.to_vec());
        transport.set(&self.key, save.to_value());
        progress.clear_dirty();
        self.ticks_since_flush = 0;
        metrics::inc_flushes();
        debug!(
            "flushed save: {} items, {} queued",
            save.items.len(),
            save.queue.len()
        );
        true
    }

    /// Per-tick hook: flush at most once every `flush_debounce_ticks` ticks.
    pub fn tick_flush<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        progress: &mut ProgressStore,
        queue: &ReceiveQueue,
    ) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.ticks_since_flush = self.ticks_since_flush.saturating_add(1);
        if self.ticks_since_flush < self.options.flush_debounce_ticks {
            return false;
        }
        if !self.flush_if_dirty(transport, progress, queue) {
            self.ticks_since_flush = self.options.flush_debounce_ticks;
            return false;
        }
        true
    }

    /// Final best-effort flush. Not retried.
    pub fn shutdown_flush<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        progress: &mut ProgressStore,
        queue: &ReceiveQueue,
    ) {
        if self.state == SyncState::WaitingForSnapshot {
            warn!("shutting down before the save snapshot arrived, nothing written");
            return;
        }
        self.flush_if_dirty(transport, progress, queue);
    }
}
