//! HTTP client for the music-api sidecar (source metadata and playlist
//! listings).

use crate::pipeline::{SourceMetadata, TrackMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    image: String,
}

impl From<MetaResponse> for TrackMeta {
    fn from(meta: MetaResponse) -> Self {
        TrackMeta {
            title: meta.title,
            artist: meta.author,
            cover_art_url: meta.image,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    #[serde(default)]
    tracks: Vec<PlaylistTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTrack {
    id: String,
}

pub struct MusicApiClient {
    client: reqwest::Client,
    base_url: String,
    meta_path: String,
    playlist_path: String,
}

impl MusicApiClient {
    pub fn new(
        base_url: &str,
        meta_path: &str,
        playlist_path: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            meta_path: meta_path.to_string(),
            playlist_path: playlist_path.to_string(),
        })
    }

    fn url(&self, path: &str, id: &str) -> String {
        format!("{}{}?id={}", self.base_url, path, urlencoding::encode(id))
    }

    pub async fn meta(&self, id: &str) -> Result<TrackMeta> {
        let url = self.url(&self.meta_path, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to music-api")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch meta for {}: status {}", id, response.status());
        }

        let meta: MetaResponse = response
            .json()
            .await
            .context("Failed to parse meta response")?;
        Ok(meta.into())
    }

    pub async fn playlist_entries(&self, id: &str) -> Result<Vec<String>> {
        let url = self.url(&self.playlist_path, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to music-api")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch playlist {}: status {}",
                id,
                response.status()
            );
        }

        let playlist: PlaylistResponse = response
            .json()
            .await
            .context("Failed to parse playlist response")?;
        let entries: Vec<String> = playlist.tracks.into_iter().map(|t| t.id).collect();
        debug!("music-api listed {} entries for {}", entries.len(), id);
        Ok(entries)
    }
}

#[async_trait]
impl SourceMetadata for MusicApiClient {
    async fn source_meta(&self, id: &str) -> Result<TrackMeta> {
        self.meta(id).await
    }
}
