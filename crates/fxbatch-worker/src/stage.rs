//! Stage runner: executes one unit of stage work off the caller's task.

use std::any::Any;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::error::{StageError, StageKind, StageResult};
use crate::metrics;

/// Runs the work of one stage on the worker pool.
///
/// The runner never looks at what the work produces. A panic in the work
/// or an expired deadline becomes the stage's own failure variant, so a
/// caller always gets exactly one result.
#[derive(Debug, Clone)]
pub struct StageRunner {
    stage: StageKind,
    timeout: Option<Duration>,
}

impl StageRunner {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Execute `work` on the worker pool and wait for its result.
    pub async fn execute<F, Fut, T>(&self, work: F) -> StageResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let mut task = AbortOnDrop(tokio::spawn(async move { work().await }));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task.0).await {
                Ok(joined) => joined,
                Err(_) => {
                    // Aborted when `task` drops, killing any child process it owns.
                    metrics::record_stage_duration(self.stage, started.elapsed().as_secs_f64());
                    return Err(StageError::for_stage(
                        self.stage,
                        format!("{} stage timed out after {:.1}s", self.stage, limit.as_secs_f64()),
                    ));
                }
            },
            None => (&mut task.0).await,
        };

        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(StageError::for_stage(
                self.stage,
                format!("{} stage panicked: {}", self.stage, panic_message(e.into_panic())),
            )),
            Err(e) => Err(StageError::for_stage(
                self.stage,
                format!("{} stage cancelled: {e}", self.stage),
            )),
        };

        metrics::record_stage_duration(self.stage, started.elapsed().as_secs_f64());
        result
    }

    /// Continuation form of [`execute`](Self::execute).
    ///
    /// Returns immediately; `on_complete` runs exactly once on a worker.
    pub fn run<F, Fut, T, C>(&self, work: F, on_complete: C) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(StageResult<T>) + Send + 'static,
    {
        let runner = self.clone();
        tokio::spawn(async move {
            let result = runner.execute(work).await;
            on_complete(result);
        })
    }
}

/// Aborts the stage work if whoever waits on it goes away first.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
