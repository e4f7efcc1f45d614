//! Persisted per-track state.

use serde::Serialize;

/// Durable state of a single track.
///
/// Text fields are empty until the stage that resolves them has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    /// Uploader name as reported by the media source.
    pub author: String,
    /// Resolved by enrichment.
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub done: bool,
    pub error: bool,
    pub error_message: String,
}

impl TrackRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Record a terminal failure. Clears the done flag.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.done = false;
        self.error = true;
        self.error_message = message.into();
    }

    /// Record a successful completion. Clears any previous failure.
    pub fn mark_done(&mut self) {
        self.done = true;
        self.error = false;
        self.error_message.clear();
    }
}
