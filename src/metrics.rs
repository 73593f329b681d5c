//! Process-wide counters for the multiworld client.
//! Cheap relaxed atomics; read them with [`snapshot`].
use std::sync::atomic::{AtomicU64, Ordering};

static CHECKS_SENT: AtomicU64 = AtomicU64::new(0);
static ITEMS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static ITEMS_DROPPED: AtomicU64 = AtomicU64::new(0);
static ITEMS_APPLIED: AtomicU64 = AtomicU64::new(0);
static TRAPS_TRIGGERED: AtomicU64 = AtomicU64::new(0);
static FLUSHES: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_IMPORTS: AtomicU64 = AtomicU64::new(0);

pub fn inc_checks_sent() {
    CHECKS_SENT.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_items_received() {
    ITEMS_RECEIVED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_items_dropped() {
    ITEMS_DROPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_items_applied(n: u64) {
    ITEMS_APPLIED.fetch_add(n, Ordering::Relaxed);
}

pub fn inc_traps_triggered() {
    TRAPS_TRIGGERED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_flushes() {
    FLUSHES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_snapshot_imports() {
    SNAPSHOT_IMPORTS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub checks_sent: u64,
    pub items_received: u64,
    pub items_dropped: u64,
    pub items_applied: u64,
    pub traps_triggered: u64,
    pub flushes: u64,
    pub snapshot_imports: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        checks_sent: CHECKS_SENT.load(Ordering::Relaxed),
        items_received: ITEMS_RECEIVED.load(Ordering::Relaxed),
        items_dropped: ITEMS_DROPPED.load(Ordering::Relaxed),
        items_applied: ITEMS_APPLIED.load(Ordering::Relaxed),
        traps_triggered: TRAPS_TRIGGERED.load(Ordering::Relaxed),
        flushes: FLUSHES.load(Ordering::Relaxed),
        snapshot_imports: SNAPSHOT_IMPORTS.load(Ordering::Relaxed),
    }
}
