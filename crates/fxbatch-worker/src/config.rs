//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use fxbatch_storage::AuthorizationStatus;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs per batch (None = every job starts at once)
    pub max_concurrent_jobs: Option<usize>,
    /// Directory for encoded scratch files
    pub scratch_dir: PathBuf,
    /// Managed library finished exports are imported into
    pub library_dir: PathBuf,
    /// Answer the library gives to authorization requests
    pub authorization: AuthorizationStatus,
    /// Per-stage deadline
    pub stage_timeout: Option<Duration>,
    /// How long in-flight jobs get to unwind on Ctrl-C
    pub shutdown_timeout: Duration,
    /// Suffix scratch files with the job ID
    pub unique_scratch_names: bool,
    /// x264 constant rate factor
    pub crf: u8,
    /// x264 preset
    pub preset: String,
    /// Length of every transition
    pub transition: Duration,
    /// Source clips, in order
    pub clips: Vec<PathBuf>,
    /// Effect names; `all` expands to every effect
    pub effects: Vec<String>,
    /// Install the Prometheus recorder and print metrics after the batch
    pub metrics_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: None,
            scratch_dir: std::env::temp_dir().join("fxbatch"),
            library_dir: PathBuf::from("./library"),
            authorization: AuthorizationStatus::Granted,
            stage_timeout: None,
            shutdown_timeout: Duration::from_secs(10),
            unique_scratch_names: true,
            crf: 20,
            preset: "veryfast".to_string(),
            transition: Duration::from_secs(1),
            clips: Vec::new(),
            effects: vec!["all".to_string()],
            metrics_enabled: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: std::env::var("FXBATCH_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0),
            scratch_dir: std::env::var("FXBATCH_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            library_dir: std::env::var("FXBATCH_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_dir),
            authorization: std::env::var("FXBATCH_AUTHORIZATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.authorization),
            stage_timeout: std::env::var("FXBATCH_STAGE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("FXBATCH_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            unique_scratch_names: std::env::var("FXBATCH_UNIQUE_SCRATCH")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.unique_scratch_names),
            crf: std::env::var("FXBATCH_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crf),
            preset: std::env::var("FXBATCH_PRESET").unwrap_or(defaults.preset),
            transition: std::env::var("FXBATCH_TRANSITION_SECS")
                .ok()
                .and_then(|s| parse_secs(&s))
                .unwrap_or(defaults.transition),
            clips: std::env::var("FXBATCH_CLIPS")
                .map(|s| split_list(&s).into_iter().map(PathBuf::from).collect())
                .unwrap_or(defaults.clips),
            effects: std::env::var("FXBATCH_EFFECTS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.effects),
            metrics_enabled: std::env::var("FXBATCH_METRICS")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Positive, representable seconds. Anything else falls back to the default.
fn parse_secs(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
