//! TrackStore trait definition.

use super::models::TrackRecord;
use anyhow::Result;

/// Durable per-track state.
///
/// Implementations must be safe for concurrent upserts of distinct ids.
pub trait TrackStore: Send + Sync {
    /// Insert the record, or merge it into the existing row for the same id.
    ///
    /// Merging never blanks a stored text field with an empty one, and never
    /// clears `done` unless the incoming record carries a failure.
    fn upsert(&self, record: &TrackRecord) -> Result<()>;

    /// Get a record by id.
    fn get(&self, id: &str) -> Result<Option<TrackRecord>>;
}
