//! In-process collaborators and a pipeline harness built on them.

use super::constants::*;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use track_harvester::pipeline::{
    ArtifactWriter, CatalogSearch, GenreLookup, MediaRetriever, RetryPolicy, SourceInfo,
    SourceMetadata, TrackMeta, Transcoder,
};
use track_harvester::{
    Collaborators, Pipeline, PipelineSettings, SqliteTrackStore, TrackRecord, TrackStore,
};

/// Retrieves by writing a small staged file. Ids in `failing` always fail.
pub struct FakeRetriever {
    failing: HashSet<String>,
    collections: HashMap<String, Vec<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeRetriever {
    pub fn new() -> Self {
        let mut collections = HashMap::new();
        collections.insert(
            COLLECTION_ID.to_string(),
            vec![TRACK_OK_ID.to_string(), TRACK_OK_ID_2.to_string()],
        );
        Self {
            failing: [TRACK_RETRIEVAL_FAIL_ID.to_string()].into_iter().collect(),
            collections,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of retrieve attempts made for `id`.
    pub fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn title_for(id: &str) -> String {
        format!("Song {}", id)
    }
}

#[async_trait]
impl MediaRetriever for FakeRetriever {
    async fn retrieve(&self, id: &str, staging_dir: &Path) -> Result<(SourceInfo, PathBuf)> {
        *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
        if self.failing.contains(id) {
            bail!("source refused {}", id);
        }
        let staged = staging_dir.join(format!("{}.temp", id));
        tokio::fs::write(&staged, b"source bytes").await?;
        Ok((
            SourceInfo {
                title: Self::title_for(id),
                author: FAKE_UPLOADER.to_string(),
            },
            staged,
        ))
    }

    async fn list_collection(&self, id: &str) -> Result<Vec<String>> {
        self.collections
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no such collection: {}", id))
    }
}

/// Returns empty metadata so the pipeline falls back to what the retriever
/// reported.
pub struct FakeSourceMeta;

#[async_trait]
impl SourceMetadata for FakeSourceMeta {
    async fn source_meta(&self, _id: &str) -> Result<TrackMeta> {
        Ok(TrackMeta::default())
    }
}

/// Copies the staged file next to it with an `.m4a` extension.
pub struct FakeTranscoder {
    fail: bool,
    runs: AtomicUsize,
}

impl FakeTranscoder {
    pub fn ok() -> Self {
        Self {
            fail: false,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output_stem: &Path) -> Result<PathBuf> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("encoder exited with status 1");
        }
        let output = output_stem.with_extension("m4a");
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

/// Echoes the query back as a single candidate on [`FAKE_ALBUM`].
pub struct FakeCatalog;

#[async_trait]
impl CatalogSearch for FakeCatalog {
    async fn search(&self, title: &str, artist: &str) -> Result<Vec<TrackMeta>> {
        Ok(vec![TrackMeta {
            title: title.to_string(),
            artist: artist.to_string(),
            album: FAKE_ALBUM.to_string(),
            genre: String::new(),
            cover_art_url: String::new(),
        }])
    }
}

/// Fails the first `failures` lookups, then reports [`FAKE_GENRE`].
pub struct FakeGenre {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeGenre {
    pub fn ok() -> Self {
        Self::failing_times(0)
    }

    pub fn failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenreLookup for FakeGenre {
    async fn genre(&self, _id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            bail!("genre service down");
        }
        Ok(FAKE_GENRE.to_string())
    }
}

/// Copies the transcoded file into `dir` as `<artist> - <title>.m4a`, or
/// always fails when built with [`CopyWriter::failing`].
pub struct CopyWriter {
    dir: PathBuf,
    fail: bool,
}

impl CopyWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, fail: false }
    }

    pub fn failing(dir: PathBuf) -> Self {
        Self { dir, fail: true }
    }
}

#[async_trait]
impl ArtifactWriter for CopyWriter {
    async fn write(&self, transcoded: &Path, meta: &TrackMeta) -> Result<PathBuf> {
        if self.fail {
            bail!("destination is read-only");
        }
        let destination = self
            .dir
            .join(format!("{} - {}.m4a", meta.artist, meta.title));
        tokio::fs::copy(transcoded, &destination).await?;
        tokio::fs::remove_file(transcoded).await?;
        Ok(destination)
    }
}

/// Knobs for [`TestPipeline`].
pub struct TestPipelineBuilder {
    transcoder: FakeTranscoder,
    genre: FakeGenre,
    writer_fails: bool,
    intake_capacity: usize,
    fast_redrive: bool,
}

impl TestPipelineBuilder {
    pub fn failing_transcoder(mut self) -> Self {
        self.transcoder = FakeTranscoder::failing();
        self
    }

    pub fn genre(mut self, genre: FakeGenre) -> Self {
        self.genre = genre;
        self
    }

    pub fn failing_writer(mut self) -> Self {
        self.writer_fails = true;
        self
    }

    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Redrive every few milliseconds instead of staying idle.
    pub fn fast_redrive(mut self) -> Self {
        self.fast_redrive = true;
        self
    }

    pub fn build(self) -> TestPipeline {
        let staging_dir = TempDir::new().expect("Failed to create staging dir");
        let output_dir = TempDir::new().expect("Failed to create output dir");
        let store = Arc::new(SqliteTrackStore::in_memory().expect("Failed to open track store"));
        let retriever = Arc::new(FakeRetriever::new());
        let transcoder = Arc::new(self.transcoder);
        let genre = Arc::new(self.genre);
        let writer = if self.writer_fails {
            CopyWriter::failing(output_dir.path().to_path_buf())
        } else {
            CopyWriter::new(output_dir.path().to_path_buf())
        };

        let collaborators = Collaborators {
            retriever: retriever.clone(),
            source_meta: Arc::new(FakeSourceMeta),
            transcoder: transcoder.clone(),
            catalog: Arc::new(FakeCatalog),
            genre: genre.clone(),
            writer: Arc::new(writer),
            store: store.clone(),
        };
        let mut settings = TestPipeline::settings(staging_dir.path(), self.intake_capacity);
        if self.fast_redrive {
            settings.redrive_idle = Duration::from_millis(5);
            settings.redrive_cooldown = Duration::from_millis(5);
        }

        TestPipeline {
            pipeline: Arc::new(Pipeline::new(collaborators, settings)),
            store,
            retriever,
            transcoder,
            genre,
            staging_dir: staging_dir.path().to_path_buf(),
            output_dir: output_dir.path().to_path_buf(),
            shutdown: CancellationToken::new(),
            _staging_dir: staging_dir,
            _output_dir: output_dir,
        }
    }
}

/// A pipeline wired to the fakes, with its own staging and output dirs.
///
/// Background loops are cancelled on drop.
pub struct TestPipeline {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<SqliteTrackStore>,
    pub retriever: Arc<FakeRetriever>,
    pub transcoder: Arc<FakeTranscoder>,
    pub genre: Arc<FakeGenre>,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    shutdown: CancellationToken,
    _staging_dir: TempDir,
    _output_dir: TempDir,
}

impl TestPipeline {
    pub fn builder() -> TestPipelineBuilder {
        TestPipelineBuilder {
            transcoder: FakeTranscoder::ok(),
            genre: FakeGenre::ok(),
            writer_fails: false,
            intake_capacity: 100,
            fast_redrive: false,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_failing_transcoder() -> Self {
        Self::builder().failing_transcoder().build()
    }

    pub fn with_intake_capacity(capacity: usize) -> Self {
        Self::builder().intake_capacity(capacity).build()
    }

    /// Short intervals everywhere except redrive, which is kept idle so
    /// tests can observe what was queued.
    pub fn settings(staging_dir: &Path, intake_capacity: usize) -> PipelineSettings {
        PipelineSettings {
            staging_dir: staging_dir.to_path_buf(),
            intake_capacity,
            intake_idle: Duration::from_millis(5),
            redrive_cap: REDRIVE_CAP,
            redrive_idle: Duration::from_secs(3600),
            redrive_cooldown: Duration::from_secs(3600),
            collection_retention: Duration::from_secs(3600),
            housekeeping_interval: Duration::from_secs(3600),
            retrieval_concurrency: 2,
            transcode_concurrency: 1,
            enrichment_concurrency: 2,
            retrieval_retry: RetryPolicy::fixed(INLINE_ATTEMPTS, Duration::from_millis(1)),
            enrichment_retry: RetryPolicy::fixed(INLINE_ATTEMPTS, Duration::from_millis(1)),
        }
    }

    /// Start the intake, redrive and housekeeping loops.
    pub fn start(&self) {
        let _ = self.pipeline.spawn_loops(self.shutdown.clone());
    }

    pub fn record(&self, id: &str) -> Option<TrackRecord> {
        self.store.get(id).expect("Failed to read track record")
    }

    /// Files currently in the output dir.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        list_dir(&self.output_dir)
    }

    /// Files left behind in the staging dir.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        list_dir(&self.staging_dir)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|entry| entry.expect("Failed to read dir entry").path())
        .collect()
}

impl Drop for TestPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
