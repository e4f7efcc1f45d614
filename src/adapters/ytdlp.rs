//! Media retrieval through a yt-dlp child process.
//!
//! Every call is tried with the default player client first and retried
//! once with the embedded player client, which gets past some playback
//! restrictions.

use super::music_api::MusicApiClient;
use crate::pipeline::{MediaRetriever, SourceInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

const EMBEDDED_CLIENT_ARGS: [&str; 2] = ["--extractor-args", "youtube:player_client=web_embedded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerClient {
    Default,
    Embedded,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: String,
    uploader: Option<String>,
    channel: Option<String>,
}

impl From<VideoInfo> for SourceInfo {
    fn from(info: VideoInfo) -> Self {
        SourceInfo {
            title: info.title,
            author: info.uploader.or(info.channel).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
}

pub struct YtDlpRetriever {
    binary: String,
    music_api: Arc<MusicApiClient>,
}

impl YtDlpRetriever {
    pub fn new(binary: impl Into<String>, music_api: Arc<MusicApiClient>) -> Self {
        Self {
            binary: binary.into(),
            music_api,
        }
    }

    fn video_url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }

    fn playlist_url(id: &str) -> String {
        format!("https://www.youtube.com/playlist?list={}", id)
    }

    /// Run yt-dlp and return its stdout.
    async fn run(&self, client: PlayerClient, args: &[&str], target: &str) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command.args(["--no-warnings", "--no-progress"]);
        if client == PlayerClient::Embedded {
            command.args(EMBEDDED_CLIENT_ARGS);
        }
        let output = command
            .args(args)
            .arg("--")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "yt-dlp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }

    /// Run with the default client, falling back to the embedded one.
    async fn run_with_fallback(&self, args: &[&str], target: &str, what: &str) -> Result<Vec<u8>> {
        match self.run(PlayerClient::Default, args, target).await {
            Ok(out) => Ok(out),
            Err(e) => {
                warn!("{} failed, retrying with embedded player: {:#}", what, e);
                self.run(PlayerClient::Embedded, args, target)
                    .await
                    .with_context(|| format!("{} failed with embedded player", what))
            }
        }
    }

    pub async fn video_info(&self, id: &str) -> Result<SourceInfo> {
        let stdout = self
            .run_with_fallback(
                &["--dump-single-json", "--skip-download"],
                &Self::video_url(id),
                &format!("Fetching info for {}", id),
            )
            .await?;
        parse_video_info(&stdout)
    }

    pub async fn download_audio(&self, id: &str) -> Result<Vec<u8>> {
        let bytes = self
            .run_with_fallback(
                &["-f", "bestaudio", "-o", "-"],
                &Self::video_url(id),
                &format!("Downloading {}", id),
            )
            .await?;
        if bytes.is_empty() {
            anyhow::bail!("yt-dlp returned no data for {}", id);
        }
        Ok(bytes)
    }

    async fn flat_playlist(&self, id: &str) -> Result<Vec<String>> {
        let stdout = self
            .run(
                PlayerClient::Default,
                &["--flat-playlist", "--dump-single-json"],
                &Self::playlist_url(id),
            )
            .await?;
        parse_flat_playlist(&stdout)
    }
}

fn parse_video_info(stdout: &[u8]) -> Result<SourceInfo> {
    let info: VideoInfo =
        serde_json::from_slice(stdout).context("Failed to parse yt-dlp video info")?;
    Ok(info.into())
}

fn parse_flat_playlist(stdout: &[u8]) -> Result<Vec<String>> {
    let playlist: FlatPlaylist =
        serde_json::from_slice(stdout).context("Failed to parse yt-dlp playlist")?;
    Ok(playlist.entries.into_iter().map(|e| e.id).collect())
}

/// Staged file for a retrieved track: `<staging>/<id>.temp`.
pub fn staged_path(staging_dir: &Path, id: &str) -> PathBuf {
    staging_dir.join(format!("{}.temp", id))
}

#[async_trait]
impl MediaRetriever for YtDlpRetriever {
    async fn retrieve(&self, id: &str, staging_dir: &Path) -> Result<(SourceInfo, PathBuf)> {
        let info = self.video_info(id).await?;
        let bytes = self.download_audio(id).await?;

        tokio::fs::create_dir_all(staging_dir)
            .await
            .with_context(|| format!("Failed to create staging dir {:?}", staging_dir))?;
        let path = staged_path(staging_dir, id);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write staged file {:?}", path))?;

        info!(
            "Retrieved {} ('{}' by '{}', {} bytes)",
            id,
            info.title,
            info.author,
            bytes.len()
        );
        Ok((info, path))
    }

    async fn list_collection(&self, id: &str) -> Result<Vec<String>> {
        match self.flat_playlist(id).await {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Listing {} with yt-dlp failed, falling back to music-api: {:#}",
                    id, e
                );
                self.music_api.playlist_entries(id).await
            }
        }
    }
}
