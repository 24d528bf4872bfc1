//! Shared data models for the fxbatch transition exporter.
//!
//! This crate provides Serde-serializable types for:
//! - Transition effects
//! - Source clips shared across a batch
//! - Job identifiers and outcomes
//! - Batch phases and reports

pub mod batch;
pub mod clip;
pub mod effect;
pub mod job;

pub use batch::{BatchPhase, BatchReport};
pub use clip::{ClipSet, MediaClip};
pub use effect::{Effect, EffectParseError};
pub use job::{BatchId, JobId, JobOutcome};
