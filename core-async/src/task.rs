//! Task spawning and background-task ownership.
//!
//! Long-lived workers (the session store's restore + change listener) are
//! held in a [`BackgroundTask`], which aborts the worker when stopped or
//! dropped so no listener outlives its owner.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

pub use tokio::task::{yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// # Examples
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// A spawned worker that is aborted on [`stop`](BackgroundTask::stop) or drop.
#[derive(Debug)]
pub struct BackgroundTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawn `future` on the current runtime and take ownership of it.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Mutex::new(Some(tokio::task::spawn(future))),
        }
    }

    /// Abort the worker. Returns `false` when it was already stopped.
    pub fn stop(&self) -> bool {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
