use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ids::NetId;

fn default_notify() -> bool {
    true
}

/// A received item waiting to be applied on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedItem {
    pub item_id: NetId,
    #[serde(default = "default_notify")]
    pub notify: bool,
}

impl QueuedItem {
    pub fn new(item_id: NetId, notify: bool) -> Self {
        Self { item_id, notify }
    }

    /// Accepts both `{item_id, notify}` objects and bare ids (older saves).
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(id) = value.as_i64() {
            return Some(Self::new(NetId(id), true));
        }
        let id = value.get("item_id")?.as_i64()?;
        let notify = value
            .get("notify")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Some(Self::new(NetId(id), notify))
    }

    pub fn to_value(self) -> Value {
        json!({"item_id": self.item_id.0, "notify": self.notify})
    }
}

/// FIFO of pending grants. Unbounded; emptied one pass per tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveQueue {
    entries: VecDeque<QueuedItem>,
}

impl ReceiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: QueuedItem) {
        self.entries.push_back(item);
    }

    /// Put older entries (e.g. restored from a save) ahead of everything queued so far.
    pub fn prepend<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = QueuedItem>,
        I::IntoIter: DoubleEndedIterator,
    {
        for item in items.into_iter().rev() {
            self.entries.push_front(item);
        }
    }

    /// Take everything that is queued right now, oldest first.
    pub fn take_pass(&mut self) -> Vec<QueuedItem> {
        self.entries.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedItem> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<QueuedItem> {
        self.entries.iter().copied().collect()
    }
}
