//! Data types flowing through the pipeline.

use serde::Serialize;
use thiserror::Error;

/// Length of a single-track identifier. Anything else names a collection.
pub const TRACK_ID_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Track,
    Collection,
}

impl JobKind {
    pub fn classify(id: &str) -> Self {
        if id.chars().count() == TRACK_ID_LEN {
            JobKind::Track
        } else {
            JobKind::Collection
        }
    }
}

/// A unit of intake work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let kind = JobKind::classify(&id);
        Self { id, kind }
    }
}

/// Candidate or resolved catalog metadata for one track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackMeta {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub cover_art_url: String,
}

/// Source-reported facts about a retrieved track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub title: String,
    pub author: String,
}

/// Stage failures and intake rejections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("intake queue is full")]
    QueueFull,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl PipelineError {
    /// Whether the failed item goes to the redrive queue.
    pub fn requeues(&self) -> bool {
        matches!(
            self,
            PipelineError::Retrieval(_) | PipelineError::Enrichment(_)
        )
    }

    pub(crate) fn retrieval(err: anyhow::Error) -> Self {
        PipelineError::Retrieval(format!("{:#}", err))
    }

    pub(crate) fn transcode(err: anyhow::Error) -> Self {
        PipelineError::Transcode(format!("{:#}", err))
    }

    pub(crate) fn enrichment(err: anyhow::Error) -> Self {
        PipelineError::Enrichment(format!("{:#}", err))
    }

    pub(crate) fn persistence(err: anyhow::Error) -> Self {
        PipelineError::Persistence(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_length() {
        assert_eq!(JobKind::classify("dQw4w9WgXcQ"), JobKind::Track);
        assert_eq!(
            JobKind::classify("PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf"),
            JobKind::Collection
        );
        assert_eq!(JobKind::classify("short"), JobKind::Collection);
        assert_eq!(JobKind::classify("dQw4w9WgXcQx"), JobKind::Collection);
    }

    #[test]
    fn test_job_new_classifies() {
        let job = Job::new("dQw4w9WgXcQ");
        assert_eq!(job.kind, JobKind::Track);
    }

    #[test]
    fn test_requeues_only_retrieval_and_enrichment() {
        assert!(PipelineError::Retrieval("x".into()).requeues());
        assert!(PipelineError::Enrichment("x".into()).requeues());
        assert!(!PipelineError::Transcode("x".into()).requeues());
        assert!(!PipelineError::Persistence("x".into()).requeues());
        assert!(!PipelineError::QueueFull.requeues());
        assert!(!PipelineError::InvalidIdentifier("".into()).requeues());
    }

    #[test]
    fn test_stage_error_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("fetching info");
        let stage = PipelineError::retrieval(err);
        assert_eq!(
            stage.to_string(),
            "retrieval failed: fetching info: connection reset"
        );
    }
}
