//! Fail-fast task group.
//!
//! Every spawned task runs to completion; the first error any task returns
//! is kept and reported by [`TaskGroup::wait`]. Later errors are logged and
//! dropped. Nothing is cancelled when a task fails.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct TaskGroup {
    tasks: JoinSet<()>,
    first_error: Arc<Mutex<Option<Error>>>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn an unbounded task.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let first_error = Arc::clone(&self.first_error);
        self.tasks.spawn(async move {
            if let Err(e) = task.await {
                record(&first_error, e);
            }
        });
    }

    /// Spawn a task that holds one permit of `permits` while it runs.
    ///
    /// The permit is acquired inside the task, so spawning never blocks,
    /// and is released when the task ends however it ends.
    pub fn spawn_bounded<F>(&mut self, permits: &Arc<Semaphore>, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let permits = Arc::clone(permits);
        self.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskPanicked(e.to_string()))?;
            task.await
        });
    }

    /// Whether any task has failed so far.
    pub fn has_failed(&self) -> bool {
        self.first_error.lock().is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Join every task and return the first error, if any.
    ///
    /// # Errors
    ///
    /// The first task error, or [`Error::TaskPanicked`] if a task panicked
    /// before any task returned an error.
    pub async fn wait(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                record(&self.first_error, Error::TaskPanicked(e.to_string()));
            }
        }
        match self.first_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn record(slot: &Mutex<Option<Error>>, error: Error) {
    let mut slot = slot.lock();
    if slot.is_none() {
        *slot = Some(error);
    } else {
        tracing::debug!(error = %error, "Additional task failure");
    }
}
