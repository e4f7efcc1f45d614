//! Acquisition pipeline: intake, bounded per-stage concurrency, inline
//! retry, redrive and the per-item stage driver.

mod collaborators;
mod collection_status;
mod gates;
mod models;
mod processor;
mod redrive;
mod retry_policy;

pub use collaborators::{
    ArtifactWriter, CatalogSearch, GenreLookup, MediaRetriever, SourceMetadata, Transcoder,
};
pub use collection_status::{CollectionStatus, CollectionStatusTable};
pub use gates::{ConcurrencyGates, Gate, GatePermit};
pub use models::{Job, JobKind, PipelineError, SourceInfo, TrackMeta, TRACK_ID_LEN};
pub use processor::{Collaborators, JobStatus, Pipeline, PipelineSettings};
pub use redrive::RedriveQueue;
pub use retry_policy::{RetryPolicy, RetrySchedule};
