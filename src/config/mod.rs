mod file_config;

pub use file_config::{
    ConcurrencyConfig, FileConfig, RedriveConfig, RetryConfig, ServicesConfig, SpotifyConfig,
    TranscodeConfig,
};

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub port: u16,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub http_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub download_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub port: u16,
    pub ytdlp_path: String,
    pub http_timeout_sec: u64,
    pub intake_capacity: usize,
    pub intake_idle_ms: u64,
    pub collection_status_retention_secs: u64,
    pub housekeeping_interval_secs: u64,

    // Sections (with defaults)
    pub concurrency: ConcurrencySettings,
    pub retry: RetrySettings,
    pub redrive: RedriveSettings,
    pub spotify: SpotifySettings,
    pub services: ServicesSettings,
    pub transcode: TranscodeSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be specified via --db-path or in config file"))?;

        let download_dir = file
            .download_dir
            .map(PathBuf::from)
            .or_else(|| cli.download_dir.clone())
            .ok_or_else(|| {
                anyhow!("download_dir must be specified via --download-dir or in config file")
            })?;
        if download_dir.exists() && !download_dir.is_dir() {
            bail!("download_dir is not a directory: {:?}", download_dir);
        }

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .or_else(|| cli.temp_dir.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("track-harvester"));

        let port = file.port.unwrap_or(cli.port);
        let ytdlp_path = file
            .ytdlp_path
            .or_else(|| cli.ytdlp_path.clone())
            .unwrap_or_else(|| "yt-dlp".to_string());
        let http_timeout_sec = file.http_timeout_sec.unwrap_or(cli.http_timeout_sec);
        let intake_capacity = file.intake_capacity.unwrap_or(100);
        let intake_idle_ms = file.intake_idle_ms.unwrap_or(1000);
        let collection_status_retention_secs =
            file.collection_status_retention_secs.unwrap_or(3600);
        let housekeeping_interval_secs = file.housekeeping_interval_secs.unwrap_or(300);

        let concurrency_file = file.concurrency.unwrap_or_default();
        let concurrency = ConcurrencySettings {
            retrieval: concurrency_file.retrieval.unwrap_or(3),
            transcode: concurrency_file.transcode.unwrap_or(2),
            enrichment: concurrency_file.enrichment.unwrap_or(3),
        };

        let retry_file = file.retry.unwrap_or_default();
        let retry = RetrySettings {
            retrieval_attempts: retry_file.retrieval_attempts.unwrap_or(5),
            enrichment_attempts: retry_file.enrichment_attempts.unwrap_or(5),
            fixed_delay_ms: retry_file.fixed_delay_ms.unwrap_or(1000),
            fibonacci_base_ms: retry_file.fibonacci_base_ms.unwrap_or(1000),
            fibonacci_max_ms: retry_file.fibonacci_max_ms.unwrap_or(60_000),
        };

        let redrive_file = file.redrive.unwrap_or_default();
        let redrive = RedriveSettings {
            cap: redrive_file.cap.unwrap_or(5),
            idle_interval_secs: redrive_file.idle_interval_secs.unwrap_or(10),
            cooldown_interval_secs: redrive_file.cooldown_interval_secs.unwrap_or(30),
        };

        // [spotify] credentials fall back to CLI flags
        let spotify_file = file.spotify.unwrap_or_default();
        let client_id = spotify_file
            .client_id
            .or_else(|| cli.spotify_client_id.clone())
            .ok_or_else(|| {
                anyhow!("spotify client_id must be specified via --spotify-client-id or [spotify]")
            })?;
        let client_secret = spotify_file
            .client_secret
            .or_else(|| cli.spotify_client_secret.clone())
            .ok_or_else(|| {
                anyhow!(
                    "spotify client_secret must be specified via --spotify-client-secret or [spotify]"
                )
            })?;
        let spotify = SpotifySettings {
            client_id,
            client_secret,
            accounts_url: spotify_file
                .accounts_url
                .unwrap_or_else(|| "https://accounts.spotify.com".to_string()),
            api_url: spotify_file
                .api_url
                .unwrap_or_else(|| "https://api.spotify.com".to_string()),
        };

        let services_file = file.services.unwrap_or_default();
        let services = ServicesSettings {
            music_api_base_url: services_file
                .music_api_base_url
                .unwrap_or_else(|| "http://music-api".to_string()),
            music_api_port: services_file.music_api_port.unwrap_or(8000),
            meta_path: services_file.meta_path.unwrap_or_else(|| "/meta".to_string()),
            playlist_path: services_file
                .playlist_path
                .unwrap_or_else(|| "/playlist".to_string()),
            genre_base_url: services_file
                .genre_base_url
                .unwrap_or_else(|| "http://genrer".to_string()),
            genre_port: services_file.genre_port.unwrap_or(8001),
            genre_path: services_file.genre_path.unwrap_or_else(|| "/genre".to_string()),
        };

        let transcode_file = file.transcode.unwrap_or_default();
        let transcode = TranscodeSettings {
            ffmpeg_path: transcode_file
                .ffmpeg_path
                .or_else(|| cli.ffmpeg_path.clone())
                .unwrap_or_else(|| "ffmpeg".to_string()),
            codec: transcode_file.codec.unwrap_or_else(|| "aac".to_string()),
            bitrate: transcode_file.bitrate.unwrap_or_else(|| "192k".to_string()),
            format: transcode_file.format.unwrap_or_else(|| "ipod".to_string()),
            extension: transcode_file.extension.unwrap_or_else(|| "m4a".to_string()),
        };

        Ok(Self {
            db_path,
            download_dir,
            temp_dir,
            port,
            ytdlp_path,
            http_timeout_sec,
            intake_capacity,
            intake_idle_ms,
            collection_status_retention_secs,
            housekeeping_interval_secs,
            concurrency,
            retry,
            redrive,
            spotify,
            services,
            transcode,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_sec)
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencySettings {
    pub retrieval: usize,
    pub transcode: usize,
    pub enrichment: usize,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub retrieval_attempts: u32,
    pub enrichment_attempts: u32,
    pub fixed_delay_ms: u64,
    pub fibonacci_base_ms: u64,
    pub fibonacci_max_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retrieval_attempts: 5,
            enrichment_attempts: 5,
            fixed_delay_ms: 1000,
            fibonacci_base_ms: 1000,
            fibonacci_max_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedriveSettings {
    pub cap: u32,
    pub idle_interval_secs: u64,
    pub cooldown_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub accounts_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct ServicesSettings {
    pub music_api_base_url: String,
    pub music_api_port: u16,
    pub meta_path: String,
    pub playlist_path: String,
    pub genre_base_url: String,
    pub genre_port: u16,
    pub genre_path: String,
}

impl ServicesSettings {
    pub fn music_api_url(&self) -> String {
        format!(
            "{}:{}",
            self.music_api_base_url.trim_end_matches('/'),
            self.music_api_port
        )
    }

    pub fn genre_url(&self) -> String {
        format!(
            "{}:{}",
            self.genre_base_url.trim_end_matches('/'),
            self.genre_port
        )
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub ffmpeg_path: String,
    pub codec: String,
    pub bitrate: String,
    pub format: String,
    pub extension: String,
}
