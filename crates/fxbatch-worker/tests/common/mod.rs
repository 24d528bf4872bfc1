//! Fake collaborators for driving the orchestrator without FFmpeg.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{Barrier, Semaphore};

use fxbatch_media::{Exporter, ExporterFactory, MediaError, MediaResult, TransitionCompositor, TransitionResult};
use fxbatch_models::{ClipSet, Effect, MediaClip};
use fxbatch_storage::{AuthorizationStatus, StorageAuthority, StorageError, StorageResult};
use fxbatch_worker::Pipeline;

pub const TRANSITION: Duration = Duration::from_secs(1);

pub fn clips() -> ClipSet {
    ClipSet::new(vec![
        MediaClip::new("a.mp4", Duration::from_secs(4)),
        MediaClip::new("b.mp4", Duration::from_secs(4)),
        MediaClip::new("c.mp4", Duration::from_secs(4)),
    ])
}

#[derive(Default)]
pub struct FakeCompositor {
    pub fail: HashSet<Effect>,
    pub panic: HashSet<Effect>,
    pub merged: Mutex<Vec<Effect>>,
}

impl FakeCompositor {
    pub fn failing(effects: &[Effect]) -> Self {
        Self {
            fail: effects.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn panicking(effects: &[Effect]) -> Self {
        Self {
            panic: effects.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransitionCompositor for FakeCompositor {
    async fn merge(&self, clips: &ClipSet, effect: Effect, duration: Duration) -> MediaResult<TransitionResult> {
        self.merged.lock().unwrap().push(effect);
        if self.panic.contains(&effect) {
            panic!("compositor crashed on {effect}");
        }
        if self.fail.contains(&effect) {
            return Err(MediaError::invalid_input(format!("cannot merge {effect}")));
        }
        Ok(TransitionResult {
            effect,
            inputs: clips.iter().map(|c| c.path.clone()).collect(),
            filter_graph: format!("xfade={effect}"),
            output_label: "[vout]".to_string(),
            output_duration: clips.total_duration().saturating_sub(duration),
        })
    }
}

/// Exporter behavior shared by every exporter a factory creates.
#[derive(Default)]
pub struct ExportControl {
    pub delays: Mutex<Vec<(Effect, Duration)>>,
    pub hang: HashSet<Effect>,
    /// Write part of the output, then fail as a disk error would.
    pub fail_export: HashSet<Effect>,
    pub gate: Option<Arc<Semaphore>>,
    pub barrier: Option<Arc<Barrier>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

#[derive(Default)]
pub struct FakeExporters {
    pub fail_create: HashSet<Effect>,
    pub created: Mutex<Vec<Effect>>,
    pub control: Arc<ExportControl>,
}

impl FakeExporters {
    pub fn with_control(control: ExportControl) -> Self {
        Self {
            control: Arc::new(control),
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<Effect> {
        self.created.lock().unwrap().clone()
    }
}

impl ExporterFactory for FakeExporters {
    fn create(&self, result: TransitionResult) -> MediaResult<Box<dyn Exporter>> {
        self.created.lock().unwrap().push(result.effect);
        if self.fail_create.contains(&result.effect) {
            return Err(MediaError::FfmpegNotFound);
        }
        Ok(Box::new(FakeExporter {
            effect: result.effect,
            control: Arc::clone(&self.control),
        }))
    }
}

struct FakeExporter {
    effect: Effect,
    control: Arc<ExportControl>,
}

#[async_trait]
impl Exporter for FakeExporter {
    async fn export(self: Box<Self>, destination: &Path) -> MediaResult<()> {
        let control = &self.control;
        let now = control.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        control.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::fs::write(destination, format!("encoded {}", self.effect)).await?;

        if control.fail_export.contains(&self.effect) {
            control.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(MediaError::Io(std::io::Error::other("No space left on device")));
        }

        let delay = control
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(effect, _)| *effect == self.effect)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if control.hang.contains(&self.effect) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(gate) = &control.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(barrier) = &control.barrier {
            barrier.wait().await;
        }

        control.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeStorage {
    pub status: AuthorizationStatus,
    /// Library names whose import fails after authorization was granted.
    pub fail_import: HashSet<String>,
    pub authorization_requests: AtomicUsize,
    pub imported: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeStorage {
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status,
            fail_import: HashSet::new(),
            authorization_requests: AtomicUsize::new(0),
            imported: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_import(names: &[&str]) -> Self {
        Self {
            fail_import: names.iter().map(|n| n.to_string()).collect(),
            ..Self::new(AuthorizationStatus::Granted)
        }
    }

    /// Scratch paths that were imported.
    pub fn imported(&self) -> Vec<PathBuf> {
        self.imported.lock().unwrap().iter().map(|(path, _)| path.clone()).collect()
    }

    /// Library names imports were stored under.
    pub fn imported_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.imported.lock().unwrap().iter().map(|(_, name)| name.clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StorageAuthority for FakeStorage {
    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        self.status
    }

    async fn import_file(&self, path: &Path, file_name: &str) -> StorageResult<PathBuf> {
        if self.fail_import.contains(file_name) {
            return Err(StorageError::import_failed(format!("library rejected {file_name}")));
        }
        tokio::fs::remove_file(path).await?;
        self.imported
            .lock()
            .unwrap()
            .push((path.to_path_buf(), file_name.to_string()));
        Ok(PathBuf::from(file_name))
    }
}

/// Fakes wired into a pipeline over a fresh scratch directory.
pub struct Harness {
    pub scratch: TempDir,
    pub compositor: Arc<FakeCompositor>,
    pub exporters: Arc<FakeExporters>,
    pub storage: Arc<FakeStorage>,
}

impl Harness {
    pub fn new(compositor: FakeCompositor, exporters: FakeExporters, storage: FakeStorage) -> Self {
        Self {
            scratch: TempDir::new().unwrap(),
            compositor: Arc::new(compositor),
            exporters: Arc::new(exporters),
            storage: Arc::new(storage),
        }
    }

    pub fn granted() -> Self {
        Self::new(
            FakeCompositor::default(),
            FakeExporters::default(),
            FakeStorage::new(AuthorizationStatus::Granted),
        )
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.compositor.clone(),
            self.exporters.clone(),
            self.storage.clone(),
            self.scratch.path(),
        )
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}
