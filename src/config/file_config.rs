use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub download_dir: Option<String>,
    pub temp_dir: Option<String>,
    pub port: Option<u16>,
    pub ytdlp_path: Option<String>,
    pub http_timeout_sec: Option<u64>,
    pub intake_capacity: Option<usize>,
    pub intake_idle_ms: Option<u64>,
    pub collection_status_retention_secs: Option<u64>,
    pub housekeeping_interval_secs: Option<u64>,

    // Sections
    pub concurrency: Option<ConcurrencyConfig>,
    pub retry: Option<RetryConfig>,
    pub redrive: Option<RedriveConfig>,
    pub spotify: Option<SpotifyConfig>,
    pub services: Option<ServicesConfig>,
    pub transcode: Option<TranscodeConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub retrieval: Option<usize>,
    pub transcode: Option<usize>,
    pub enrichment: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub retrieval_attempts: Option<u32>,
    pub enrichment_attempts: Option<u32>,
    pub fixed_delay_ms: Option<u64>,
    pub fibonacci_base_ms: Option<u64>,
    pub fibonacci_max_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RedriveConfig {
    pub cap: Option<u32>,
    pub idle_interval_secs: Option<u64>,
    pub cooldown_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub accounts_url: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ServicesConfig {
    pub music_api_base_url: Option<String>,
    pub music_api_port: Option<u16>,
    pub meta_path: Option<String>,
    pub playlist_path: Option<String>,
    pub genre_base_url: Option<String>,
    pub genre_port: Option<u16>,
    pub genre_path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: Option<String>,
    pub codec: Option<String>,
    pub bitrate: Option<String>,
    pub format: Option<String>,
    pub extension: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
