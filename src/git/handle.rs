use crate::error::{GitError, GitResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::watch;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a dispatched task
///
/// Used to surface each failure once, however often it is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cloneable handle to the eventual result of a spawned task
///
/// The task runs to completion on the runtime whether or not any handle is
/// still alive. Polling never blocks.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: watch::Receiver<Option<GitResult<T>>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: self.rx.clone(),
        }
    }
}

impl<T> TaskHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn `future` on `runtime` and return a handle to its result
    pub fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = GitResult<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let id = TaskId::next();
        runtime.spawn(async move {
            let result = future.await;
            // No receivers left is fine, the result is simply dropped
            let _ = tx.send(Some(result));
        });
        Self { id, rx }
    }

    /// A handle that is already complete
    pub fn ready(result: GitResult<T>) -> Self {
        let (_tx, rx) = watch::channel(Some(result));
        Self {
            id: TaskId::next(),
            rx,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current result, or `None` while the task is still running
    pub fn poll(&self) -> Option<GitResult<T>> {
        let current = self.rx.borrow().clone();
        match current {
            Some(result) => Some(result),
            // Sender dropped without a value: the runtime discarded the task
            None if self.rx.has_changed().is_err() => Some(Err(GitError::TaskAborted)),
            None => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.poll().is_some()
    }

    /// Wait for the task to finish
    pub async fn wait(&self) -> GitResult<T> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(value) => match &*value {
                Some(result) => result.clone(),
                None => Err(GitError::TaskAborted),
            },
            Err(_) => Err(GitError::TaskAborted),
        }
    }
}
