//! The orchestrator: intake, per-item stage driver, redrive and housekeeping
//! loops.

use super::collaborators::{
    ArtifactWriter, CatalogSearch, GenreLookup, MediaRetriever, SourceMetadata, Transcoder,
};
use super::collection_status::{CollectionStatus, CollectionStatusTable};
use super::gates::{ConcurrencyGates, GatePermit};
use super::models::{Job, JobKind, PipelineError, SourceInfo, TrackMeta};
use super::redrive::RedriveQueue;
use super::retry_policy::RetryPolicy;
use crate::config::AppConfig;
use crate::reconcile::resolve_best_match;
use crate::track_store::{TrackRecord, TrackStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn MediaRetriever>,
    pub source_meta: Arc<dyn SourceMetadata>,
    pub transcoder: Arc<dyn Transcoder>,
    pub catalog: Arc<dyn CatalogSearch>,
    pub genre: Arc<dyn GenreLookup>,
    pub writer: Arc<dyn ArtifactWriter>,
    pub store: Arc<dyn TrackStore>,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub staging_dir: PathBuf,
    pub intake_capacity: usize,
    pub intake_idle: Duration,
    pub redrive_cap: u32,
    pub redrive_idle: Duration,
    pub redrive_cooldown: Duration,
    pub collection_retention: Duration,
    pub housekeeping_interval: Duration,
    pub retrieval_concurrency: usize,
    pub transcode_concurrency: usize,
    pub enrichment_concurrency: usize,
    pub retrieval_retry: RetryPolicy,
    pub enrichment_retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            staging_dir: config.temp_dir.clone(),
            intake_capacity: config.intake_capacity,
            intake_idle: Duration::from_millis(config.intake_idle_ms),
            redrive_cap: config.redrive.cap,
            redrive_idle: Duration::from_secs(config.redrive.idle_interval_secs),
            redrive_cooldown: Duration::from_secs(config.redrive.cooldown_interval_secs),
            collection_retention: Duration::from_secs(config.collection_status_retention_secs),
            housekeeping_interval: Duration::from_secs(config.housekeeping_interval_secs),
            retrieval_concurrency: config.concurrency.retrieval,
            transcode_concurrency: config.concurrency.transcode,
            enrichment_concurrency: config.concurrency.enrichment,
            retrieval_retry: RetryPolicy::retrieval(&config.retry),
            enrichment_retry: RetryPolicy::enrichment(&config.retry),
        }
    }
}

/// Point-in-time status of a submitted id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobStatus {
    Track(TrackRecord),
    Collection(CollectionStatus),
}

pub struct Pipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
    gates: ConcurrencyGates,
    redrive: RedriveQueue,
    collections: CollectionStatusTable,
    intake_tx: mpsc::Sender<String>,
    intake_rx: Mutex<mpsc::Receiver<String>>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(settings.intake_capacity.max(1));
        Self {
            gates: ConcurrencyGates::new(
                settings.retrieval_concurrency,
                settings.transcode_concurrency,
                settings.enrichment_concurrency,
            ),
            redrive: RedriveQueue::new(settings.redrive_cap),
            collections: CollectionStatusTable::new(),
            collaborators,
            settings,
            intake_tx,
            intake_rx: Mutex::new(intake_rx),
        }
    }

    pub fn redrive(&self) -> &RedriveQueue {
        &self.redrive
    }

    pub fn gates(&self) -> &ConcurrencyGates {
        &self.gates
    }

    /// Enqueue an id for processing. Returns as soon as it is queued.
    pub fn submit(&self, id: &str) -> Result<(), PipelineError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(PipelineError::InvalidIdentifier(id.to_string()));
        }
        self.intake_tx.try_send(id.to_string()).map_err(|e| {
            warn!("Rejecting {}: {}", id, e);
            PipelineError::QueueFull
        })?;
        debug!("Accepted {} into intake", id);
        Ok(())
    }

    /// Start the intake, redrive and housekeeping loops.
    pub fn spawn_loops(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let intake = {
            let pipeline = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { pipeline.run_intake(shutdown).await })
        };
        let redrive = {
            let pipeline = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { pipeline.run_redrive(shutdown).await })
        };
        let housekeeping = {
            let pipeline = self.clone();
            tokio::spawn(async move { pipeline.run_housekeeping(shutdown).await })
        };
        vec![intake, redrive, housekeeping]
    }

    /// Drain the intake queue until shutdown.
    pub async fn run_intake(self: &Arc<Self>, shutdown: CancellationToken) {
        info!(
            "Intake loop starting (capacity={}, idle={:?})",
            self.settings.intake_capacity, self.settings.intake_idle
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let next = self.intake_rx.lock().unwrap().try_recv().ok();
            match next {
                Some(id) => {
                    tokio::select! {
                        _ = self.dispatch(Job::new(id)) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.intake_idle) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }

        info!("Intake loop stopped");
    }

    async fn dispatch(self: &Arc<Self>, job: Job) {
        match job.kind {
            JobKind::Track => {
                info!("Dispatching track {}", job.id);
                let permit = self.gates.retrieval.acquire().await;
                let pipeline = self.clone();
                tokio::spawn(async move {
                    let _ = pipeline.process_with_permit(&job.id, permit).await;
                });
            }
            JobKind::Collection => {
                info!("Dispatching collection {}", job.id);
                let pipeline = self.clone();
                tokio::spawn(async move { pipeline.process_collection(&job.id).await });
            }
        }
    }

    /// List a collection, run every member through the pipeline and wait for
    /// all of them.
    pub async fn process_collection(self: &Arc<Self>, id: &str) {
        self.collections.mark_started(id);

        let members = match self.collaborators.retriever.list_collection(id).await {
            Ok(members) => members,
            Err(e) => {
                error!("Failed to list collection {}: {:#}", id, e);
                self.collections.mark_settled(id);
                return;
            }
        };
        info!("Collection {} has {} members", id, members.len());

        let mut tasks = JoinSet::new();
        for member in members {
            let permit = self.gates.retrieval.acquire().await;
            let pipeline = self.clone();
            tasks.spawn(async move { pipeline.process_with_permit(&member, permit).await });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(_)) => failed += 1,
                Err(e) => {
                    error!("Member task of collection {} panicked: {}", id, e);
                    failed += 1;
                }
            }
        }

        self.collections.mark_settled(id);
        info!("Collection {} settled ({} failed)", id, failed);
    }

    /// Re-drive failed items until shutdown.
    pub async fn run_redrive(self: &Arc<Self>, shutdown: CancellationToken) {
        info!(
            "Redrive loop starting (idle={:?}, cooldown={:?}, cap={})",
            self.settings.redrive_idle, self.settings.redrive_cooldown, self.settings.redrive_cap
        );

        loop {
            let wait = match self.redrive.dequeue() {
                Some(id) => {
                    info!("Redriving {}", id);
                    if let Err(e) = self.process_item(&id).await {
                        warn!("Redrive of {} failed: {}", id, e);
                    }
                    self.settings.redrive_cooldown
                }
                None => self.settings.redrive_idle,
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Redrive loop stopped");
    }

    /// Periodically evict settled collection statuses.
    pub async fn run_housekeeping(self: &Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.housekeeping_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.collections.evict_settled(self.settings.collection_retention);
                    if evicted > 0 {
                        debug!("Evicted {} settled collection statuses", evicted);
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Housekeeping loop stopped");
    }

    /// Run a single item through every stage.
    pub async fn process_item(&self, id: &str) -> Result<TrackRecord, PipelineError> {
        let permit = self.gates.retrieval.acquire().await;
        self.process_with_permit(id, permit).await
    }

    async fn process_with_permit(
        &self,
        id: &str,
        retrieval_permit: GatePermit,
    ) -> Result<TrackRecord, PipelineError> {
        info!("Processing track {}", id);
        let mut record = TrackRecord::new(id);

        let outcome = match self.run_stages(&mut record, retrieval_permit).await {
            Ok(()) => {
                record.mark_done();
                self.persist(&record).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!("Track {} done", id);
                Ok(record)
            }
            Err(e) => {
                error!("Track {} failed: {}", id, e);
                record.mark_failed(e.to_string());
                if let Err(store_err) = self.persist(&record).await {
                    error!("Failed to record failure of {}: {}", id, store_err);
                }
                if e.requeues() {
                    self.redrive.add(id);
                }
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        record: &mut TrackRecord,
        retrieval_permit: GatePermit,
    ) -> Result<(), PipelineError> {
        let id = record.id.clone();
        let c = &self.collaborators;
        let staging = self.settings.staging_dir.as_path();

        let (info, staged) = self
            .settings
            .retrieval_retry
            .retry(&format!("retrieve {}", id), || c.retriever.retrieve(&id, staging))
            .await
            .map_err(PipelineError::retrieval)?;
        retrieval_permit.release();
        record.title = info.title.clone();
        record.author = info.author.clone();
        self.persist(record).await?;

        let transcoded = {
            let _permit = self.gates.transcode.acquire().await;
            let result = c
                .transcoder
                .transcode(&staged, &staging.join(&id))
                .await
                .map_err(PipelineError::transcode);
            remove_staged(&staged).await;
            result?
        };

        let finished = self.enrich_and_write(record, &info, &transcoded).await;
        if finished.is_err() {
            remove_staged(&transcoded).await;
        }
        finished
    }

    /// Enrichment, reconciliation and the artifact write. The writer takes
    /// ownership of `transcoded` only on success.
    async fn enrich_and_write(
        &self,
        record: &mut TrackRecord,
        info: &SourceInfo,
        transcoded: &Path,
    ) -> Result<(), PipelineError> {
        let id = record.id.clone();
        let c = &self.collaborators;

        let (genre, mut source, candidates) = {
            let _permit = self.gates.enrichment.acquire().await;
            let retry = &self.settings.enrichment_retry;
            let genre = retry
                .retry(&format!("genre lookup {}", id), || c.genre.genre(&id))
                .await
                .map_err(PipelineError::enrichment)?;
            let source = retry
                .retry(&format!("source metadata {}", id), || c.source_meta.source_meta(&id))
                .await
                .map_err(PipelineError::enrichment)?;
            let (title, artist) = (
                non_empty_or(&source.title, &info.title),
                non_empty_or(&source.artist, &info.author),
            );
            let candidates = retry
                .retry(&format!("catalog search {}", id), || c.catalog.search(&title, &artist))
                .await
                .map_err(PipelineError::enrichment)?;
            (genre, source, candidates)
        };

        source.title = non_empty_or(&source.title, &info.title);
        source.artist = non_empty_or(&source.artist, &info.author);
        source.genre = genre;
        let resolved: TrackMeta = resolve_best_match(c.catalog.as_ref(), &source, &candidates).await;
        record.artist = resolved.artist.clone();
        record.album = resolved.album.clone();
        record.genre = resolved.genre.clone();

        let artifact = c
            .writer
            .write(transcoded, &resolved)
            .await
            .map_err(PipelineError::persistence)?;
        info!("Wrote {} to {:?}", id, artifact);
        Ok(())
    }

    async fn persist(&self, record: &TrackRecord) -> Result<(), PipelineError> {
        let store = self.collaborators.store.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.upsert(&record))
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?
            .map_err(PipelineError::persistence)
    }

    pub async fn track_status(&self, id: &str) -> Result<Option<TrackRecord>, PipelineError> {
        let store = self.collaborators.store.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.get(&id))
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?
            .map_err(PipelineError::persistence)
    }

    pub fn collection_status(&self, id: &str) -> Option<CollectionStatus> {
        self.collections.get(id)
    }

    /// Status of any submitted id, dispatched on its kind.
    pub async fn status(&self, id: &str) -> Result<Option<JobStatus>, PipelineError> {
        match JobKind::classify(id) {
            JobKind::Track => Ok(self.track_status(id).await?.map(JobStatus::Track)),
            JobKind::Collection => Ok(self.collection_status(id).map(JobStatus::Collection)),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!("Could not remove staged file {:?}: {}", path, e);
    }
}
