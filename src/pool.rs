//! Worker pools the processor submits requests to.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::object::BoxFuture;

/// Accepts units of work and runs them concurrently.
pub trait WorkerPool: Send + Sync + 'static {
    fn execute(&self, task: BoxFuture<'static, ()>);
}

/// Runs tasks with `tokio::spawn`, at most `size` at a time.
///
/// Tasks beyond the limit are spawned immediately but wait for a permit
/// before doing any work.
#[derive(Debug, Clone)]
pub struct TokioWorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl TokioWorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks currently running.
    pub fn active(&self) -> usize {
        self.size - self.permits.available_permits()
    }
}

impl WorkerPool for TokioWorkerPool {
    fn execute(&self, task: BoxFuture<'static, ()>) {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }
}
