//! A set of tasks sharing one cancellation token and reporting the first error.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{Error, Result};

/// Tasks joined together: the first task to fail cancels the shared token,
/// and [`TaskGroup::wait`] reports that failure once all tasks have ended.
///
/// Dropping the group aborts any task still running.
#[derive(Debug)]
pub struct TaskGroup {
    tasks: JoinSet<()>,
    token: CancellationToken,
    first_error: Arc<Mutex<Option<Error>>>,
}

impl TaskGroup {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Tasks spawned and not yet reaped by `wait`.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run `task` on `handle` as a member of the group.
    pub fn spawn_on<F>(&mut self, task: F, handle: &Handle)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let first_error = Arc::clone(&self.first_error);
        self.tasks.spawn_on(
            async move {
                if let Err(e) = task.await {
                    record(&first_error, &token, e);
                }
            },
            handle,
        );
    }

    /// Wait for every task, then return the first error any of them hit.
    pub async fn wait(&mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                record(&self.first_error, &self.token, Error::TaskFailed(e.to_string()));
            }
        }
        match self.first_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Keep `error` if it is the first, and cancel the group.
fn record(first_error: &Mutex<Option<Error>>, token: &CancellationToken, error: Error) {
    {
        let mut slot = first_error.lock();
        if slot.is_none() {
            debug!(error = %error, "task failed; cancelling group");
            *slot = Some(error);
        }
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_all_succeed() {
        let token = CancellationToken::new();
        let mut group = TaskGroup::new(token.clone());
        let handle = Handle::current();
        for _ in 0..4 {
            group.spawn_on(async { Ok(()) }, &handle);
        }
        assert_eq!(group.len(), 4);
        group.wait().await.unwrap();
        assert!(group.is_empty());
        assert!(!token.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_first_error_cancels_siblings() {
        let token = CancellationToken::new();
        let mut group = TaskGroup::new(token.clone());
        let handle = Handle::current();

        for _ in 0..3 {
            let token = token.clone();
            group.spawn_on(
                async move {
                    token.cancelled().await;
                    Err(Error::Cancelled)
                },
                &handle,
            );
        }
        group.spawn_on(async { Err(Error::Failpoint("boom".into())) }, &handle);

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, Error::Failpoint(ref n) if n == "boom"));
        assert!(token.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panic_becomes_task_failed() {
        let mut group = TaskGroup::new(CancellationToken::new());
        let explode = true;
        group.spawn_on(
            async move {
                if explode {
                    panic!("probe exploded");
                }
                Ok(())
            },
            &Handle::current(),
        );
        assert!(matches!(group.wait().await, Err(Error::TaskFailed(_))));
    }
}
