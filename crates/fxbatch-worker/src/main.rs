//! Transition batch exporter binary.

use std::sync::Arc;

use anyhow::{bail, Context};
use futures::future::try_join_all;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fxbatch_media::probe_clip;
use fxbatch_models::{BatchReport, ClipSet, Effect};
use fxbatch_worker::metrics::init_metrics;
use fxbatch_worker::{BatchConfig, BatchOrchestrator, MainQueue, Pipeline, WorkerConfig};

fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("fxbatch=info,fxbatch_worker=info,fxbatch_media=info,fxbatch_storage=info")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting fxbatch");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    let shutdown_timeout = config.shutdown_timeout;

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async {
        tokio::select! {
            result = run(config) => exit_code(result),
            _ = tokio::signal::ctrl_c() => {
                warn!("Received shutdown signal, abandoning batch");
                130
            }
        }
    });

    // Drops every in-flight job task, which kills its FFmpeg child and
    // removes its scratch file.
    runtime.shutdown_timeout(shutdown_timeout);
    std::process::exit(code);
}

fn exit_code(outcome: anyhow::Result<BatchReport>) -> i32 {
    match outcome {
        Ok(report) if report.all_succeeded() => 0,
        Ok(report) => {
            error!("{} of {} exports failed", report.failed(), report.total);
            1
        }
        Err(e) => {
            error!("fxbatch failed: {:#}", e);
            1
        }
    }
}

async fn run(config: WorkerConfig) -> anyhow::Result<BatchReport> {
    let metrics = if config.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    if config.clips.len() < 2 {
        bail!("FXBATCH_CLIPS must list at least two clips");
    }

    let effects = Effect::expand(&config.effects);
    if effects.is_empty() {
        bail!("FXBATCH_EFFECTS names no known effect");
    }

    let clips = try_join_all(config.clips.iter().map(probe_clip))
        .await
        .context("Failed to probe source clips")?;
    let clips = ClipSet::new(clips);
    info!(
        clips = clips.len(),
        total_secs = clips.total_duration().as_secs_f64(),
        effects = effects.len(),
        "Probed source clips"
    );

    let pipeline = Arc::new(Pipeline::from_config(&config));
    let orchestrator = BatchOrchestrator::new(pipeline, BatchConfig::from(&config));
    let mut queue = MainQueue::new();

    let handle = orchestrator.run_all(
        &effects,
        clips,
        config.transition,
        |index, outcome| {
            if outcome.success {
                info!("[{}] export complete ({})", index, outcome.effect);
            } else {
                warn!(
                    "[{}] export error ({}): {}",
                    index,
                    outcome.effect,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        },
        || info!("export all complete"),
        queue.context(),
    )?;

    let report = handle.wait().await?;
    queue.drain();

    info!(
        batch_id = %report.batch_id,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch summary"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(handle) = metrics {
        println!("{}", handle.render());
    }

    Ok(report)
}
