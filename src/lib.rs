//! Track Harvester Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod adapters;
pub mod config;
pub mod pipeline;
pub mod reconcile;
pub mod server;
pub mod sqlite_persistence;
pub mod track_store;

// Re-export commonly used types for convenience
pub use pipeline::{Collaborators, Pipeline, PipelineError, PipelineSettings};
pub use server::{make_app, run_server};
pub use track_store::{SqliteTrackStore, TrackRecord, TrackStore};
