//! Detached background requests
//!
//! Best-effort remote calls that the caller does not wait for are spawned on
//! a [`JoinSet`] owned by the engine. Dropping the set aborts whatever is
//! still running; [`BackgroundTasks::settle`] waits for everything instead.

use parking_lot::Mutex;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::warn;

/// Set of detached tasks owned by one engine
#[derive(Debug, Default)]
pub(crate) struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current Tokio runtime.
    ///
    /// Outside a Tokio runtime nothing is spawned and the task is handed
    /// back, so the caller can drive it on its own executor.
    pub(crate) fn spawn<F>(&self, task: F) -> Result<(), F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            return Err(task);
        };
        let mut set = self.set.lock();
        // Reap finished tasks so the set does not grow without bound
        while let Some(result) = set.try_join_next() {
            log_join_error(result);
        }
        set.spawn_on(task, &handle);
        Ok(())
    }

    /// Number of tasks not yet reaped
    pub(crate) fn pending(&self) -> usize {
        self.set.lock().len()
    }

    /// Wait until every spawned task, including ones spawned meanwhile, has
    /// finished.
    pub(crate) async fn settle(&self) {
        loop {
            let mut drained = std::mem::take(&mut *self.set.lock());
            if drained.is_empty() {
                return;
            }
            while let Some(result) = drained.join_next().await {
                log_join_error(result);
            }
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if !e.is_cancelled() {
            warn!(error = %e, "Background request panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_settle_waits_for_all_tasks() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            let spawned = tasks.spawn(async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(spawned.is_ok());
        }

        tasks.settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(tasks.pending(), 0);
    }

    #[test]
    fn test_spawn_without_runtime_hands_task_back() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        };

        let Err(task) = tasks.spawn(task) else {
            panic!("spawned without a runtime");
        };
        assert_eq!(tasks.pending(), 0);
        futures::executor::block_on(task);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settle_on_empty_set_returns() {
        BackgroundTasks::new().settle().await;
    }
}
