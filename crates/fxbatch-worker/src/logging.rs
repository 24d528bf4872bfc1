//! Structured job logging utilities.
//!
//! Every job logs through a [`JobLogger`] so lifecycle events carry the
//! same `batch_id`, `job_id` and `effect` fields.

use tracing::{debug, error, info, Span};

use fxbatch_models::{BatchId, Effect, JobId};

use crate::error::StageKind;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    batch_id: Option<String>,
    job_id: String,
    effect: Effect,
}

impl JobLogger {
    pub fn new(job_id: &JobId, effect: Effect) -> Self {
        Self {
            batch_id: None,
            job_id: job_id.to_string(),
            effect,
        }
    }

    /// Attach the batch the job belongs to.
    pub fn with_batch(mut self, batch_id: &BatchId) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }

    fn batch(&self) -> &str {
        self.batch_id.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect,
            "Job started: {}", message
        );
    }

    pub fn log_stage_start(&self, stage: StageKind) {
        debug!(
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect,
            stage = %stage,
            "Stage started"
        );
    }

    pub fn log_stage_finish(&self, stage: StageKind, elapsed_ms: u64) {
        debug!(
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect,
            stage = %stage,
            elapsed_ms,
            "Stage finished"
        );
    }

    pub fn log_error(&self, stage: StageKind, message: &str) {
        error!(
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect,
            stage = %stage,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            batch_id = %self.batch(),
            job_id = %self.job_id,
            effect = %self.effect
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, Effect::Dissolve);

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.effect(), Effect::Dissolve);
        assert_eq!(logger.batch(), "-");
    }

    #[test]
    fn test_job_logger_with_batch() {
        let batch_id = BatchId::new();
        let logger = JobLogger::new(&JobId::from_string("job-1"), Effect::Fade).with_batch(&batch_id);

        assert_eq!(logger.job_id(), "job-1");
        assert_eq!(logger.batch(), batch_id.as_str());
    }
}
