//! Append-only narrative log of what happens in a room.
//!
//! The room writes one [`JournalEntry`] per notable action (combat,
//! door, pickup, departure). Presentation layers read it; nothing in the
//! game depends on it.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use skirmish_protocol::{PlayerId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub message: String,
    /// Players the entry is about.
    pub involved: Vec<PlayerId>,
}

impl JournalEntry {
    pub fn new(message: impl Into<String>, involved: impl Into<Vec<PlayerId>>) -> Self {
        Self {
            message: message.into(),
            involved: involved.into(),
        }
    }
}

/// Write-only sink for journal entries.
pub trait Journal: Send + Sync {
    fn record(&self, room: &RoomId, entry: JournalEntry);
}

/// Emits every entry as a `tracing` event on the `skirmish::journal`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJournal;

impl Journal for TracingJournal {
    fn record(&self, room: &RoomId, entry: JournalEntry) {
        tracing::info!(
            target: "skirmish::journal",
            room_id = %room,
            involved = ?entry.involved,
            "{}",
            entry.message
        );
    }
}

/// Keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<(RoomId, JournalEntry)>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one room, oldest first.
    pub fn entries(&self, room: &RoomId) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .map(|all| {
                all.iter()
                    .filter(|(id, _)| id == room)
                    .map(|(_, entry)| entry.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|all| all.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for MemoryJournal {
    fn record(&self, room: &RoomId, entry: JournalEntry) {
        if let Ok(mut all) = self.entries.lock() {
            all.push((room.clone(), entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_journal_filters_by_room() {
        let journal = MemoryJournal::new();
        let g1 = RoomId::from("G1");
        journal.record(&g1, JournalEntry::new("door opened", [PlayerId(1)]));
        journal.record(&RoomId::from("G2"), JournalEntry::new("wall broken", Vec::new()));
        assert_eq!(journal.len(), 2);
        let entries = journal.entries(&g1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].involved, vec![PlayerId(1)]);
    }
}
