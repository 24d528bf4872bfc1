//! Concurrent transition export orchestrator.
//!
//! This crate provides:
//! - The stage runner that executes stage work on the worker pool
//! - Export jobs (merge, encode, persist) with scratch cleanup
//! - The batch orchestrator and its completion contexts
//! - Configuration, structured logging and metrics

pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod stage;

pub use config::WorkerConfig;
pub use dispatch::{Callback, CompletionContext, MainQueue, QueueSender};
pub use error::{BatchError, StageError, StageKind, StageResult, WorkerError, WorkerResult};
pub use job::{EncodedArtifact, ExportJob, Pipeline};
pub use logging::JobLogger;
pub use orchestrator::{BatchConfig, BatchHandle, BatchOrchestrator, BatchProgress, BatchState};
pub use stage::StageRunner;
