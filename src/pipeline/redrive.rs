//! Dead-letter queue for items that exhausted inline retries.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Default)]
struct RedriveState {
    queue: VecDeque<String>,
    attempts: HashMap<String, u32>,
}

/// FIFO of failed ids with a lifetime attempt counter per id.
///
/// Each id is queued at most `cap` times over the life of the process.
pub struct RedriveQueue {
    state: Mutex<RedriveState>,
    cap: u32,
}

impl RedriveQueue {
    pub fn new(cap: u32) -> Self {
        Self {
            state: Mutex::new(RedriveState::default()),
            cap,
        }
    }

    /// Count an attempt for `id` and queue it if still under the cap.
    ///
    /// Returns whether the id was queued.
    pub fn add(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let count = state.attempts.entry(id.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if count <= self.cap {
            state.queue.push_back(id.to_string());
            info!("Queued {} for redrive (attempt {}/{})", id, count, self.cap);
            true
        } else {
            warn!(
                "Dropping {} from redrive after {} attempts",
                id, self.cap
            );
            false
        }
    }

    pub fn dequeue(&self) -> Option<String> {
        self.state.lock().unwrap().queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime number of `add` calls for `id`.
    pub fn attempts(&self, id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().unwrap().queue.iter().any(|q| q == id)
    }
}
