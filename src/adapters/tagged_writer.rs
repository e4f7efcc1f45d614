//! Writes tags into the transcoded file and moves it into the destination
//! directory.

use crate::pipeline::{ArtifactWriter, TrackMeta};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|\x00-\x1F]"#).unwrap();
}

/// Make `name` safe to use as a file name on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct TaggedFileWriter {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl TaggedFileWriter {
    pub fn new(download_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            download_dir,
        })
    }

    /// `<download_dir>/<Artist> - <Title>.<ext>`, with the extension taken
    /// from the transcoded file.
    pub fn destination_for(&self, transcoded: &Path, meta: &TrackMeta) -> PathBuf {
        let stem = sanitize_filename(&format!("{} - {}", meta.artist, meta.title));
        let file_name = match transcoded.extension() {
            Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
            None => stem,
        };
        self.download_dir.join(file_name)
    }

    async fn download_cover_art(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch cover art")?;
        if !response.status().is_success() {
            anyhow::bail!("cover art request returned {}", response.status());
        }
        let bytes = response.bytes().await.context("Failed to read cover art")?;
        Ok(bytes.to_vec())
    }

    /// Download cover art. Failures are logged and yield `None`.
    async fn fetch_cover_art(&self, url: &str) -> Option<Vec<u8>> {
        if url.is_empty() {
            return None;
        }
        match self.download_cover_art(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Writing without cover art from {}: {:#}", url, e);
                None
            }
        }
    }
}

/// Write title, artist, album, genre and front cover into the file's
/// primary tag.
fn write_tags(path: &Path, meta: &TrackMeta, cover: Option<Vec<u8>>) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open {:?} for tagging", path))?
        .read()
        .with_context(|| format!("Failed to read tags from {:?}", path))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| anyhow!("No writable tag available for {:?}", tag_type))?;

    tag.set_title(meta.title.clone());
    tag.set_artist(meta.artist.clone());
    if !meta.album.is_empty() {
        tag.set_album(meta.album.clone());
    }
    if !meta.genre.is_empty() {
        tag.set_genre(meta.genre.clone());
    }
    if let Some(bytes) = cover {
        match Picture::from_reader(&mut Cursor::new(bytes)) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => warn!("Skipping undecodable cover art: {}", e),
        }
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .with_context(|| format!("Failed to write tags to {:?}", path))?;
    Ok(())
}

/// Move `from` to `to`, copying when a rename is not possible.
///
/// An existing file at `to` is replaced. Returns whether that happened.
async fn move_file(from: &Path, to: &Path) -> Result<bool> {
    let replaced = tokio::fs::try_exists(to).await.unwrap_or(false);
    if replaced {
        warn!("{:?} already exists and will be replaced", to);
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(replaced);
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!("Could not remove {:?} after copy: {}", from, e);
    }
    Ok(replaced)
}

#[async_trait]
impl ArtifactWriter for TaggedFileWriter {
    async fn write(&self, transcoded: &Path, meta: &TrackMeta) -> Result<PathBuf> {
        let cover = self.fetch_cover_art(&meta.cover_art_url).await;

        let path = transcoded.to_path_buf();
        let tag_meta = meta.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &tag_meta, cover))
            .await
            .context("Tagging task panicked")??;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("Failed to create download dir {:?}", self.download_dir))?;
        let destination = self.destination_for(transcoded, meta);
        move_file(transcoded, &destination).await?;

        info!("Saved '{}' by '{}' to {:?}", meta.title, meta.artist, destination);
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(artist: &str, title: &str) -> TrackMeta {
        TrackMeta {
            title: title.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_filename_replaces_reserved_chars() {
        assert_eq!(sanitize_filename("AC/DC - What?"), "AC_DC - What_");
        assert_eq!(sanitize_filename("a:b*c\"d<e>f|g\\h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }

    #[test]
    fn test_sanitize_filename_trims_spaces_and_dots() {
        assert_eq!(sanitize_filename(" . Song . "), "Song");
        assert_eq!(sanitize_filename("..."), "untitled");
    }

    #[test]
    fn test_destination_keeps_transcoded_extension() {
        let writer = TaggedFileWriter::new(PathBuf::from("/music"), Duration::from_secs(5)).unwrap();
        let dest = writer.destination_for(Path::new("/tmp/aaaaaaaaaaa.m4a"), &meta("Artist", "Title"));
        assert_eq!(dest, PathBuf::from("/music/Artist - Title.m4a"));
    }

    #[tokio::test]
    async fn test_move_file_moves_content() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.m4a");
        let to = dir.path().join("b.m4a");
        std::fs::write(&from, b"data").unwrap();

        let replaced = move_file(&from, &to).await.unwrap();

        assert!(!replaced);
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_move_file_reports_replaced_destination() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.m4a");
        let to = dir.path().join("Artist - Title.m4a");
        std::fs::write(&to, b"earlier").unwrap();
        std::fs::write(&from, b"later").unwrap();

        let replaced = move_file(&from, &to).await.unwrap();

        assert!(replaced);
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"later");
    }

    #[tokio::test]
    async fn test_empty_cover_url_skips_fetch() {
        let writer = TaggedFileWriter::new(PathBuf::from("/music"), Duration::from_secs(5)).unwrap();
        assert!(writer.fetch_cover_art("").await.is_none());
    }

    #[tokio::test]
    async fn test_untaggable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.m4a");
        std::fs::write(&path, b"not audio").unwrap();
        let writer = TaggedFileWriter::new(dir.path().join("out"), Duration::from_secs(5)).unwrap();

        let result = writer.write(&path, &meta("A", "T")).await;

        assert!(result.is_err());
        assert!(!dir.path().join("out").join("A - T.m4a").exists());
    }
}
