//! Batch orchestrator: one export job per effect, all in flight at once.
//!
//! Jobs never touch shared batch state. Each sends its outcome over a
//! channel to a single coordinating task, which owns the pending counter
//! and fires the per-job and batch-complete callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{error, info, warn};

use fxbatch_models::{BatchId, BatchPhase, BatchReport, ClipSet, Effect, JobOutcome};

use crate::config::WorkerConfig;
use crate::dispatch::CompletionContext;
use crate::error::BatchError;
use crate::job::{ExportJob, Pipeline};
use crate::metrics;

/// Batch-level settings.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Jobs running at once (None = unbounded)
    pub max_concurrent_jobs: Option<usize>,
}

impl From<&WorkerConfig> for BatchConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }
}

/// Progress after recording one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProgress {
    Pending(usize),
    Complete,
}

/// Counter and outcome log of one batch.
///
/// `pending` starts at the job count and only ever decreases, once per
/// recorded outcome. It reaches zero exactly once.
#[derive(Debug)]
pub struct BatchState {
    total: usize,
    pending: usize,
    outcomes: Vec<JobOutcome>,
}

impl BatchState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pending: total,
            outcomes: Vec::with_capacity(total),
        }
    }

    /// Record a terminal outcome. Returns None if the batch had already
    /// completed; the outcome is then dropped.
    pub fn record(&mut self, outcome: JobOutcome) -> Option<BatchProgress> {
        if self.pending == 0 {
            return None;
        }

        self.pending -= 1;
        self.outcomes.push(outcome);

        Some(if self.pending == 0 {
            BatchProgress::Complete
        } else {
            BatchProgress::Pending(self.pending)
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }

    pub fn last_outcome(&self) -> Option<&JobOutcome> {
        self.outcomes.last()
    }

    pub fn phase(&self) -> BatchPhase {
        match self.pending {
            0 => BatchPhase::Complete,
            p if p == self.total => BatchPhase::Running { total: self.total },
            p => BatchPhase::Draining { pending: p },
        }
    }

    pub fn into_report(self, batch_id: BatchId) -> BatchReport {
        BatchReport {
            batch_id,
            total: self.total,
            outcomes: self.outcomes,
        }
    }
}

/// Handle to a launched batch.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: BatchId,
    total: usize,
    report: oneshot::Receiver<BatchReport>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Resolves once the batch-complete callback has been dispatched.
    pub async fn wait(self) -> Result<BatchReport, BatchError> {
        self.report.await.map_err(|_| BatchError::CoordinatorLost)
    }
}

/// Reports a job's outcome exactly once.
///
/// A job task that dies before reporting (runtime shutdown, a panic outside
/// any stage) still reports, as a failure, when the sender is dropped.
struct OutcomeSender {
    tx: Option<mpsc::UnboundedSender<JobOutcome>>,
    index: usize,
    effect: Effect,
    started: Instant,
}

impl OutcomeSender {
    fn new(tx: mpsc::UnboundedSender<JobOutcome>, index: usize, effect: Effect) -> Self {
        Self {
            tx: Some(tx),
            index,
            effect,
            started: Instant::now(),
        }
    }

    fn send(mut self, outcome: JobOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for OutcomeSender {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            let _ = tx.send(JobOutcome::failed(
                self.index,
                self.effect,
                "Job stopped before reporting an outcome",
                elapsed_ms,
            ));
        }
    }
}

/// Runs batches of export jobs, one batch at a time.
pub struct BatchOrchestrator {
    pipeline: Arc<Pipeline>,
    config: BatchConfig,
    phase: Arc<Mutex<BatchPhase>>,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<Pipeline>, config: BatchConfig) -> Self {
        Self {
            pipeline,
            config,
            phase: Arc::new(Mutex::new(BatchPhase::Idle)),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Current phase of the most recent batch.
    pub fn phase(&self) -> BatchPhase {
        *lock_phase(&self.phase)
    }

    /// Export a single effect outside of any batch.
    pub async fn run_one(&self, effect: Effect, clips: ClipSet, duration: Duration) -> JobOutcome {
        ExportJob::new(Arc::clone(&self.pipeline), 0, effect, clips, duration)
            .run()
            .await
    }

    /// Launch one job per effect and return immediately.
    ///
    /// `on_each_done` runs once per job on the coordinating task, one call
    /// at a time. `on_all_done` runs exactly once, after the last
    /// `on_each_done`, on `context`. Jobs run on the caller's Tokio runtime;
    /// without one the call fails with [`BatchError::NoRuntime`].
    pub fn run_all<E, A>(
        &self,
        effects: &[Effect],
        clips: ClipSet,
        duration: Duration,
        on_each_done: E,
        on_all_done: A,
        context: CompletionContext,
    ) -> Result<BatchHandle, BatchError>
    where
        E: FnMut(usize, &JobOutcome) + Send + 'static,
        A: FnOnce() + Send + 'static,
    {
        let total = effects.len();
        let runtime = Handle::try_current().map_err(|_| BatchError::NoRuntime)?;

        {
            let mut phase = lock_phase(&self.phase);
            if phase.is_active() {
                let current = *phase;
                warn!(phase = %current, "Rejecting batch while another is running");
                return Err(BatchError::BatchAlreadyRunning { phase: current });
            }
            *phase = if total == 0 {
                BatchPhase::Complete
            } else {
                BatchPhase::Running { total }
            };
        }

        let batch_id = BatchId::new();
        metrics::record_batch_started();
        info!(
            batch_id = %batch_id,
            jobs = total,
            clips = clips.len(),
            transition_secs = duration.as_secs_f64(),
            max_concurrent_jobs = ?self.config.max_concurrent_jobs,
            "Starting batch"
        );

        let (report_tx, report_rx) = oneshot::channel();
        let handle = BatchHandle {
            batch_id: batch_id.clone(),
            total,
            report: report_rx,
        };

        if total == 0 {
            info!(batch_id = %batch_id, "Empty batch, completing immediately");
            context.dispatch(Box::new(on_all_done));
            let _ = report_tx.send(BatchState::new(0).into_report(batch_id));
            return Ok(handle);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let limiter = self
            .config
            .max_concurrent_jobs
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        for (index, effect) in effects.iter().copied().enumerate() {
            let job = ExportJob::new(
                Arc::clone(&self.pipeline),
                index,
                effect,
                clips.clone(),
                duration,
            )
            .in_batch(&batch_id);
            let sender = OutcomeSender::new(tx.clone(), index, effect);
            let limiter = limiter.clone();

            runtime.spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                sender.send(job.run().await);
            });
        }
        drop(tx);

        runtime.spawn(coordinate(
            batch_id,
            BatchState::new(total),
            rx,
            Arc::clone(&self.phase),
            on_each_done,
            on_all_done,
            context,
            report_tx,
        ));

        Ok(handle)
    }
}

#[allow(clippy::too_many_arguments)]
async fn coordinate<E, A>(
    batch_id: BatchId,
    mut state: BatchState,
    mut outcomes: mpsc::UnboundedReceiver<JobOutcome>,
    phase: Arc<Mutex<BatchPhase>>,
    mut on_each_done: E,
    on_all_done: A,
    context: CompletionContext,
    report_tx: oneshot::Sender<BatchReport>,
) where
    E: FnMut(usize, &JobOutcome) + Send + 'static,
    A: FnOnce() + Send + 'static,
{
    while let Some(outcome) = outcomes.recv().await {
        metrics::record_job_finished(outcome.success);

        let Some(progress) = state.record(outcome) else {
            warn!(batch_id = %batch_id, "Dropping outcome received after batch completion");
            continue;
        };

        if let Some(recorded) = state.last_outcome() {
            info!(
                batch_id = %batch_id,
                index = recorded.index,
                effect = %recorded.effect,
                success = recorded.success,
                pending = state.pending(),
                "Job finished"
            );
            if catch_unwind(AssertUnwindSafe(|| on_each_done(recorded.index, recorded))).is_err() {
                error!(batch_id = %batch_id, index = recorded.index, "Job callback panicked");
            }
        }

        match progress {
            BatchProgress::Pending(_) => {
                *lock_phase(&phase) = state.phase();
            }
            BatchProgress::Complete => break,
        }
    }

    if !state.is_complete() {
        error!(
            batch_id = %batch_id,
            pending = state.pending(),
            "Job outcomes lost, completing batch early"
        );
    }

    *lock_phase(&phase) = BatchPhase::Complete;

    let report = state.into_report(batch_id);
    info!(
        batch_id = %report.batch_id,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch complete"
    );

    context.dispatch(Box::new(on_all_done));
    let _ = report_tx.send(report);
}

fn lock_phase(phase: &Mutex<BatchPhase>) -> MutexGuard<'_, BatchPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn outcome(index: usize) -> JobOutcome {
        JobOutcome::succeeded(index, Effect::ALL[index], 1)
    }

    #[test]
    fn test_state_counts_down_to_complete() {
        let mut state = BatchState::new(2);
        assert_eq!(state.phase(), BatchPhase::Running { total: 2 });

        assert_eq!(state.record(outcome(0)), Some(BatchProgress::Pending(1)));
        assert_eq!(state.phase(), BatchPhase::Draining { pending: 1 });

        assert_eq!(state.record(outcome(1)), Some(BatchProgress::Complete));
        assert!(state.is_complete());
        assert_eq!(state.phase(), BatchPhase::Complete);
    }

    #[test]
    fn test_state_ignores_outcomes_after_completion() {
        let mut state = BatchState::new(1);
        assert_eq!(state.record(outcome(0)), Some(BatchProgress::Complete));
        assert_eq!(state.record(outcome(1)), None);
        assert_eq!(state.pending(), 0);
        assert_eq!(state.into_report(BatchId::new()).outcomes.len(), 1);
    }

    #[test]
    fn test_simultaneous_final_outcomes_complete_once() {
        for _ in 0..100 {
            let state = Arc::new(Mutex::new(BatchState::new(2)));
            let barrier = Arc::new(Barrier::new(2));

            let workers: Vec<_> = (0..2)
                .map(|index| {
                    let state = Arc::clone(&state);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        state.lock().unwrap().record(outcome(index))
                    })
                })
                .collect();

            let completions = workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .filter(|p| *p == Some(BatchProgress::Complete))
                .count();

            assert_eq!(completions, 1);
            assert_eq!(state.lock().unwrap().pending(), 0);
        }
    }

    #[test]
    fn test_outcome_sender_reports_on_drop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(OutcomeSender::new(tx, 4, Effect::Pixelize));

        let reported = rx.try_recv().unwrap();
        assert_eq!(reported.index, 4);
        assert!(!reported.success);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_outcome_sender_sends_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        OutcomeSender::new(tx, 2, Effect::Fade).send(outcome(2));

        assert!(rx.try_recv().unwrap().success);
        assert!(rx.try_recv().is_err());
    }
}
