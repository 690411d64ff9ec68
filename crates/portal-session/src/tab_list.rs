//! Server-side mirror of the client's tab list.

use std::collections::HashMap;

use portal_net::{Message, TabListEntry};
use uuid::Uuid;

/// Rows the client currently shows, keyed by player identity.
#[derive(Debug, Default, Clone)]
pub struct TabList {
    entries: HashMap<Uuid, TabListEntry>,
}

impl TabList {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the mirror from a message about to be delivered to the client.
    pub fn track(&mut self, msg: &Message) {
        match msg {
            Message::TabListAdd(add) => {
                for entry in &add.entries {
                    self.entries.insert(entry.id, entry.clone());
                }
            }
            Message::TabListRemove(remove) => {
                for entry in &remove.entries {
                    self.entries.remove(&entry.id);
                }
            }
            _ => {}
        }
    }

    /// Insert or replace a row.
    pub fn insert(&mut self, entry: TabListEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Snapshot of every row, in no particular order.
    pub fn entries(&self) -> Vec<TabListEntry> {
        self.entries.values().cloned().collect()
    }

    /// Whether `id` is shown.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    /// Forget every row.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rows are shown.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
