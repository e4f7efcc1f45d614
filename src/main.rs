use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use track_harvester::adapters::{
    FfmpegTranscoder, GenreClient, MusicApiClient, SpotifyCatalogClient, TaggedFileWriter,
    YtDlpRetriever,
};
use track_harvester::config::{AppConfig, CliConfig, FileConfig};
use track_harvester::{run_server, Collaborators, Pipeline, PipelineSettings, SqliteTrackStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in it override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite track database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory finished tracks are written to.
    #[clap(long, value_parser = parse_path)]
    pub download_dir: Option<PathBuf>,

    /// Staging directory for downloads and transcodes.
    #[clap(long, value_parser = parse_path)]
    pub temp_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3003)]
    pub port: u16,

    /// yt-dlp executable.
    #[clap(long)]
    pub ytdlp_path: Option<String>,

    /// ffmpeg executable.
    #[clap(long)]
    pub ffmpeg_path: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Timeout in seconds for outgoing HTTP requests.
    #[clap(long, default_value_t = 30)]
    pub http_timeout_sec: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_path: args.db_path.clone(),
            download_dir: args.download_dir.clone(),
            temp_dir: args.temp_dir.clone(),
            port: args.port,
            ytdlp_path: args.ytdlp_path.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            spotify_client_id: args.spotify_client_id.clone(),
            spotify_client_secret: args.spotify_client_secret.clone(),
            http_timeout_sec: args.http_timeout_sec,
        }
    }
}

fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    let timeout = config.http_timeout();

    let music_api = Arc::new(MusicApiClient::new(
        &config.services.music_api_url(),
        &config.services.meta_path,
        &config.services.playlist_path,
        timeout,
    )?);

    info!("Opening track database at {:?}...", config.db_path);
    let store = Arc::new(SqliteTrackStore::new(&config.db_path)?);

    Ok(Collaborators {
        retriever: Arc::new(YtDlpRetriever::new(&config.ytdlp_path, music_api.clone())),
        source_meta: music_api,
        transcoder: Arc::new(FfmpegTranscoder::new(config.transcode.clone())),
        catalog: Arc::new(SpotifyCatalogClient::new(config.spotify.clone(), timeout)?),
        genre: Arc::new(GenreClient::new(
            &config.services.genre_url(),
            &config.services.genre_path,
            timeout,
        )?),
        writer: Arc::new(TaggedFileWriter::new(config.download_dir.clone(), timeout)?),
        store,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    std::fs::create_dir_all(&config.download_dir)
        .with_context(|| format!("Failed to create {:?}", config.download_dir))?;
    std::fs::create_dir_all(&config.temp_dir)
        .with_context(|| format!("Failed to create {:?}", config.temp_dir))?;

    let collaborators = build_collaborators(&config)?;
    let pipeline = Arc::new(Pipeline::new(
        collaborators,
        PipelineSettings::from_config(&config),
    ));

    let shutdown = CancellationToken::new();
    let loops = pipeline.spawn_loops(shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
            shutdown.cancel();
        });
    }

    let served = run_server(pipeline, config.port, shutdown.clone()).await;
    shutdown.cancel();
    for handle in loops {
        if let Err(e) = handle.await {
            error!("Background loop ended abnormally: {}", e);
        }
    }
    info!("Stopped");
    served
}
