//! Capabilities the pipeline drives.
//!
//! Each external system sits behind one of these traits so the orchestrator
//! can be exercised with in-process fakes.

use super::models::{SourceInfo, TrackMeta};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Fetches source media and collection listings.
#[async_trait]
pub trait MediaRetriever: Send + Sync {
    /// Download the media for `id` into a staged file and report what the
    /// source says about it. Implementations fall back to their secondary
    /// mode on their own.
    async fn retrieve(&self, id: &str, staging_dir: &Path) -> Result<(SourceInfo, PathBuf)>;

    /// Ordered member ids of a collection.
    async fn list_collection(&self, id: &str) -> Result<Vec<String>>;
}

/// Source-side metadata (title, uploader, thumbnail).
#[async_trait]
pub trait SourceMetadata: Send + Sync {
    async fn source_meta(&self, id: &str) -> Result<TrackMeta>;
}

/// Turns a staged source file into the output codec.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the path of the transcoded file.
    async fn transcode(&self, input: &Path, output_stem: &Path) -> Result<PathBuf>;
}

/// Searches the canonical catalog.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, title: &str, artist: &str) -> Result<Vec<TrackMeta>>;
}

#[async_trait]
pub trait GenreLookup: Send + Sync {
    async fn genre(&self, id: &str) -> Result<String>;
}

/// Writes the final tagged artifact into the destination store.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Returns the final artifact path.
    async fn write(&self, transcoded: &Path, meta: &TrackMeta) -> Result<PathBuf>;
}
