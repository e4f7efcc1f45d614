//! In-process completion status of collections.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Entry {
    done: bool,
    settled_at: Option<Instant>,
}

/// Point-in-time view of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionStatus {
    pub done: bool,
}

/// Collection id to completion flag. Settled entries are evicted after a
/// retention period by [`CollectionStatusTable::evict_settled`].
#[derive(Default)]
pub struct CollectionStatusTable {
    entries: Mutex<HashMap<String, Entry>>,
}

impl CollectionStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self, id: &str) {
        self.entries.lock().unwrap().insert(
            id.to_string(),
            Entry {
                done: false,
                settled_at: None,
            },
        );
    }

    pub fn mark_settled(&self, id: &str) {
        self.entries.lock().unwrap().insert(
            id.to_string(),
            Entry {
                done: true,
                settled_at: Some(Instant::now()),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<CollectionStatus> {
        self.entries
            .lock()
            .unwrap()
            .get(id)
            .map(|e| CollectionStatus { done: e.done })
    }

    /// Drop entries settled more than `retention` ago. Returns how many.
    pub fn evict_settled(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| match e.settled_at {
            Some(at) => now.duration_since(at) < retention,
            None => true,
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
