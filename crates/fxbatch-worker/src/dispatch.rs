//! Completion contexts: where the aggregate callback of a batch runs.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

/// A deferred callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Execution context for the batch-complete callback.
#[derive(Debug, Clone, Default)]
pub enum CompletionContext {
    /// Run inline on the batch's coordinating task.
    #[default]
    Coordinator,
    /// Spawn onto the given runtime.
    Runtime(Handle),
    /// Hand to a [`MainQueue`] the caller drains.
    Queue(QueueSender),
}

impl CompletionContext {
    /// Route `callback` to this context. The callback always runs once:
    /// if the queue is gone it runs inline instead.
    pub fn dispatch(&self, callback: Callback) {
        match self {
            CompletionContext::Coordinator => callback(),
            CompletionContext::Runtime(handle) => {
                handle.spawn(async move { callback() });
            }
            CompletionContext::Queue(sender) => {
                if let Err(mpsc::error::SendError(callback)) = sender.tx.send(callback) {
                    warn!("Main queue closed, running completion callback inline");
                    callback();
                }
            }
        }
    }
}

/// Sending half of a [`MainQueue`].
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<Callback>,
}

impl std::fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Serial callback queue owned by one consumer, typically the main task.
///
/// Callbacks run one at a time, in the order they were dispatched, on
/// whichever task drains the queue.
pub struct MainQueue {
    tx: mpsc::UnboundedSender<Callback>,
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl MainQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A completion context that delivers onto this queue.
    pub fn context(&self) -> CompletionContext {
        CompletionContext::Queue(QueueSender {
            tx: self.tx.clone(),
        })
    }

    /// Wait for the next callback and run it.
    pub async fn run_next(&mut self) {
        if let Some(callback) = self.rx.recv().await {
            callback();
        }
    }

    /// Run every callback already queued without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_coordinator_runs_inline() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        CompletionContext::Coordinator.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queue_defers_until_drained() {
        let mut queue = MainQueue::new();
        let context = queue.context();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&count);
            context.dispatch(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(queue.drain(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_closed_queue_runs_inline() {
        let queue = MainQueue::new();
        let context = queue.context();
        drop(queue);

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        context.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_next_runs_queued_callback() {
        let mut queue = MainQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        queue.context().dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tokio_test::block_on(queue.run_next());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runtime_context_spawns() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        CompletionContext::Runtime(Handle::current()).dispatch(Box::new(move || {
            let _ = tx.send("ran");
        }));
        assert_eq!(rx.await.unwrap(), "ran");
    }

    #[tokio::test]
    async fn test_run_next_waits_for_callback() {
        let mut queue = MainQueue::new();
        let context = queue.context();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        tokio::spawn(async move {
            context.dispatch(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        });

        queue.run_next().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
