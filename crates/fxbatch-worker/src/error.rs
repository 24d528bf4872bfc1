//! Worker error types.

use std::fmt;

use fxbatch_models::BatchPhase;
use thiserror::Error;

pub type StageResult<T> = Result<T, StageError>;
pub type WorkerResult<T> = Result<T, WorkerError>;

/// The three ordered stages of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Merge,
    Encode,
    Persist,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Merge => "merge",
            StageKind::Encode => "encode",
            StageKind::Persist => "persist",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a single stage.
///
/// Stage errors never escape a job: they become a failed `JobOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Storage permission denied")]
    PermissionDenied,

    #[error("Persist failed: {0}")]
    PersistFailed(String),
}

impl StageError {
    pub fn merge_failed(msg: impl Into<String>) -> Self {
        Self::MergeFailed(msg.into())
    }

    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    pub fn persist_failed(msg: impl Into<String>) -> Self {
        Self::PersistFailed(msg.into())
    }

    /// Generic failure attributed to `stage` (timeouts, panics).
    pub fn for_stage(stage: StageKind, msg: impl Into<String>) -> Self {
        match stage {
            StageKind::Merge => Self::merge_failed(msg),
            StageKind::Encode => Self::encode_failed(msg),
            StageKind::Persist => Self::persist_failed(msg),
        }
    }

    /// Stage the error belongs to.
    pub fn stage(&self) -> StageKind {
        match self {
            StageError::MergeFailed(_) => StageKind::Merge,
            StageError::EncodeFailed(_) => StageKind::Encode,
            StageError::PermissionDenied | StageError::PersistFailed(_) => StageKind::Persist,
        }
    }
}

/// Failure of a batch call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// A batch is still in flight; the call did not touch it.
    #[error("A batch is already running ({phase})")]
    BatchAlreadyRunning { phase: BatchPhase },

    #[error("Batch coordinator stopped before reporting")]
    CoordinatorLost,

    /// Called outside a Tokio runtime; nothing was started.
    #[error("No Tokio runtime to run the batch on")]
    NoRuntime,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Media error: {0}")]
    Media(#[from] fxbatch_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] fxbatch_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
