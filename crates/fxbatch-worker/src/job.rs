//! Export job: one effect through merge, encode and persist.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use fxbatch_media::{
    EncodeSettings, ExporterFactory, FfmpegExporterFactory, TransitionCompositor, TransitionResult,
    XfadeCompositor,
};
use fxbatch_models::{BatchId, ClipSet, Effect, JobId, JobOutcome};
use fxbatch_storage::{LibraryStorage, StorageAuthority};

use crate::config::WorkerConfig;
use crate::error::{StageError, StageKind, StageResult};
use crate::logging::JobLogger;
use crate::stage::StageRunner;

/// Scratch file written by the encode stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub effect: Effect,
    pub path: PathBuf,
}

/// The three collaborators every job runs through, plus scratch settings.
pub struct Pipeline {
    compositor: Arc<dyn TransitionCompositor>,
    exporters: Arc<dyn ExporterFactory>,
    storage: Arc<dyn StorageAuthority>,
    scratch_dir: PathBuf,
    unique_scratch_names: bool,
    stage_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        compositor: Arc<dyn TransitionCompositor>,
        exporters: Arc<dyn ExporterFactory>,
        storage: Arc<dyn StorageAuthority>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compositor,
            exporters,
            storage,
            scratch_dir: scratch_dir.into(),
            unique_scratch_names: true,
            stage_timeout: None,
        }
    }

    /// FFmpeg compositor and exporter with a library directory as storage.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let settings = EncodeSettings {
            crf: config.crf,
            preset: config.preset.clone(),
            timeout: config.stage_timeout,
            ..Default::default()
        };

        Self::new(
            Arc::new(XfadeCompositor::default()),
            Arc::new(FfmpegExporterFactory::new(settings)),
            Arc::new(LibraryStorage::new(&config.library_dir, config.authorization)),
            &config.scratch_dir,
        )
        .with_unique_scratch_names(config.unique_scratch_names)
        .with_stage_timeout(config.stage_timeout)
    }

    /// With `false`, every job for an effect writes `{effect}.mp4`.
    pub fn with_unique_scratch_names(mut self, unique: bool) -> Self {
        self.unique_scratch_names = unique;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Scratch location for one job's encoded output.
    pub fn scratch_path(&self, effect: Effect, job_id: &JobId) -> PathBuf {
        let name = if self.unique_scratch_names {
            format!("{}-{}.mp4", effect.as_str(), job_id)
        } else {
            format!("{}.mp4", effect.as_str())
        };
        self.scratch_dir.join(name)
    }

    /// Name an effect's export is stored under, independent of its scratch name.
    pub fn library_name(&self, effect: Effect) -> String {
        format!("{}.mp4", effect.as_str())
    }

    fn runner(&self, stage: StageKind) -> StageRunner {
        StageRunner::new(stage).with_timeout(self.stage_timeout)
    }
}

/// One effect's export.
///
/// Stages run strictly in order and the first failure short-circuits the
/// rest. A job always ends in exactly one [`JobOutcome`].
pub struct ExportJob {
    pipeline: Arc<Pipeline>,
    job_id: JobId,
    index: usize,
    effect: Effect,
    clips: ClipSet,
    duration: Duration,
    logger: JobLogger,
}

impl ExportJob {
    pub fn new(
        pipeline: Arc<Pipeline>,
        index: usize,
        effect: Effect,
        clips: ClipSet,
        duration: Duration,
    ) -> Self {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, effect);
        Self {
            pipeline,
            job_id,
            index,
            effect,
            clips,
            duration,
            logger,
        }
    }

    /// Tag the job's logs with the batch it belongs to.
    pub fn in_batch(mut self, batch_id: &BatchId) -> Self {
        self.logger = self.logger.with_batch(batch_id);
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn scratch_path(&self) -> PathBuf {
        self.pipeline.scratch_path(self.effect, &self.job_id)
    }

    /// Run every stage and report the outcome.
    pub async fn run(self) -> JobOutcome {
        let span = self.logger.create_span();

        async move {
            let started = Instant::now();
            self.logger.log_start(&format!(
                "{} clips, {:.2}s transition",
                self.clips.len(),
                self.duration.as_secs_f64()
            ));

            let result = self.run_stages().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(stored) => {
                    self.logger
                        .log_completion(&format!("stored at {}", stored.display()));
                    JobOutcome::succeeded(self.index, self.effect, elapsed_ms)
                }
                Err(e) => {
                    self.logger.log_error(e.stage(), &e.to_string());
                    JobOutcome::failed(self.index, self.effect, e.to_string(), elapsed_ms)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the job on the worker pool and hand the outcome to `on_done`.
    pub fn execute<C>(self, on_done: C) -> JoinHandle<()>
    where
        C: FnOnce(JobOutcome) + Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.run().await;
            on_done(outcome);
        })
    }

    async fn run_stages(&self) -> StageResult<PathBuf> {
        let transition = self.merge().await?;
        let artifact = self.encode(transition).await?;
        self.persist(artifact).await
    }

    async fn merge(&self) -> StageResult<TransitionResult> {
        let compositor = Arc::clone(&self.pipeline.compositor);
        let clips = self.clips.clone();
        let effect = self.effect;
        let duration = self.duration;

        self.stage(StageKind::Merge, move || async move {
            compositor
                .merge(&clips, effect, duration)
                .await
                .map_err(|e| StageError::merge_failed(e.to_string()))
        })
        .await
    }

    async fn encode(&self, transition: TransitionResult) -> StageResult<EncodedArtifact> {
        let exporters = Arc::clone(&self.pipeline.exporters);
        let target = self.scratch_path();
        let scratch = ScratchGuard::new(target.clone());
        let effect = self.effect;

        let result = self
            .stage(StageKind::Encode, move || async move {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StageError::encode_failed(format!("scratch dir: {e}")))?;
                }

                let exporter = exporters
                    .create(transition)
                    .map_err(|e| StageError::encode_failed(format!("exporter unavailable: {e}")))?;
                exporter
                    .export(&target)
                    .await
                    .map_err(|e| StageError::encode_failed(e.to_string()))?;

                Ok(EncodedArtifact {
                    effect,
                    path: target,
                })
            })
            .await;

        if result.is_ok() {
            scratch.keep();
        }
        result
    }

    async fn persist(&self, artifact: EncodedArtifact) -> StageResult<PathBuf> {
        let storage = Arc::clone(&self.pipeline.storage);
        let source = artifact.path.clone();
        let scratch = ScratchGuard::new(artifact.path);
        let file_name = self.pipeline.library_name(artifact.effect);

        let result = self
            .stage(StageKind::Persist, move || async move {
                if !storage.request_authorization().await.is_granted() {
                    return Err(StageError::PermissionDenied);
                }
                storage
                    .import_file(&source, &file_name)
                    .await
                    .map_err(|e| StageError::persist_failed(e.to_string()))
            })
            .await;

        if result.is_ok() {
            scratch.keep();
        }
        result
    }

    async fn stage<F, Fut, T>(&self, kind: StageKind, work: F) -> StageResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        self.logger.log_stage_start(kind);
        let result = self.pipeline.runner(kind).execute(work).await;
        self.logger
            .log_stage_finish(kind, started.elapsed().as_millis() as u64);
        result
    }
}

/// Removes a scratch file on drop unless the stage that owns it succeeded.
///
/// Covers failed stages and jobs dropped mid-stage (runtime shutdown).
struct ScratchGuard {
    path: Option<PathBuf>,
}

impl ScratchGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove scratch file: {}", e),
        }
    }
}
