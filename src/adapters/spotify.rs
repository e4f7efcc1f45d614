//! Spotify Web API catalog search with client-credentials auth.

use crate::config::SpotifySettings;
use crate::pipeline::{CatalogSearch, TrackMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl From<SpotifyTrack> for TrackMeta {
    fn from(track: SpotifyTrack) -> Self {
        TrackMeta {
            title: track.name,
            artist: track
                .artists
                .into_iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", "),
            cover_art_url: track
                .album
                .images
                .into_iter()
                .next()
                .map(|i| i.url)
                .unwrap_or_default(),
            album: track.album.name,
            genre: String::new(),
        }
    }
}

fn candidates_from(response: SearchResponse) -> Vec<TrackMeta> {
    response
        .tracks
        .map(|page| page.items.into_iter().map(TrackMeta::from).collect())
        .unwrap_or_default()
}

pub fn search_term(title: &str, artist: &str) -> String {
    format!("track:{} artist:{}", title, artist)
}

pub struct SpotifyCatalogClient {
    client: reqwest::Client,
    settings: SpotifySettings,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalogClient {
    pub fn new(settings: SpotifySettings, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, fetched again once it is close to expiry.
    async fn bearer(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.settings.client_id, self.settings.client_secret
        ));
        let url = format!(
            "{}/api/token",
            self.settings.accounts_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Failed to connect to Spotify accounts service")?;

        if !response.status().is_success() {
            anyhow::bail!("Spotify token request failed: status {}", response.status());
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse Spotify token response")?;
        info!("Refreshed Spotify token (expires in {}s)", token.expires_in);

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl CatalogSearch for SpotifyCatalogClient {
    async fn search(&self, title: &str, artist: &str) -> Result<Vec<TrackMeta>> {
        let term = search_term(title, artist);
        debug!("Searching Spotify for '{}'", term);

        let token = self.bearer().await?;
        let url = format!("{}/v1/search", self.settings.api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("q", term.as_str()), ("type", "track")])
            .send()
            .await
            .context("Failed to connect to Spotify API")?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            anyhow::bail!("Spotify rejected the access token");
        }
        if !response.status().is_success() {
            anyhow::bail!("Spotify search failed: status {}", response.status());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Spotify search response")?;
        let candidates = candidates_from(body);
        debug!("Spotify returned {} candidates for '{}'", candidates.len(), term);
        Ok(candidates)
    }
}
