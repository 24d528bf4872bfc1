//! Prometheus metrics for batch execution.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{StageKind, WorkerError, WorkerResult};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> WorkerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| WorkerError::config_error(format!("Failed to install Prometheus recorder: {e}")))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const BATCHES_TOTAL: &str = "fxbatch_batches_total";
    pub const JOBS_TOTAL: &str = "fxbatch_jobs_total";
    pub const STAGE_DURATION_SECONDS: &str = "fxbatch_stage_duration_seconds";
}

pub fn record_batch_started() {
    counter!(names::BATCHES_TOTAL).increment(1);
}

pub fn record_job_finished(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage_duration(stage: StageKind, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}
