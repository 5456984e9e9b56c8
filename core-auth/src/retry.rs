//! Explicit retry policy and the driver loop that applies it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use core_async::time::{sleep, Duration};
use core_runtime::config::RetrySettings;
use tracing::debug;

use crate::error::{AuthError, Result};

type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
type RetryablePredicate = Arc<dyn Fn(&AuthError) -> bool + Send + Sync>;

/// How often, how late, and on which errors an operation is retried.
///
/// `max_retries` counts retries after the first attempt, so an operation
/// runs at most `max_retries + 1` times.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: BackoffFn,
    retryable: RetryablePredicate,
}

impl RetryPolicy {
    /// Fixed delay between attempts, retrying transient errors only.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Arc::new(move |_| delay),
            retryable: Arc::new(AuthError::is_transient),
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn with_backoff<F>(mut self, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn with_predicate<F>(mut self, retryable: F) -> Self
    where
        F: Fn(&AuthError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(retryable);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the next attempt, or `None` when `error` ends the run.
    ///
    /// `retries_so_far` is the number of retries already performed.
    pub fn next_delay(&self, retries_so_far: u32, error: &AuthError) -> Option<Duration> {
        if retries_so_far >= self.max_retries || !(self.retryable)(error) {
            return None;
        }
        Some((self.backoff)(retries_so_far + 1))
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    ///
    /// `on_retry(retry, error, delay)` is called before each scheduled
    /// retry. The last error is returned when the loop gives up.
    pub async fn run<T, F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32, &AuthError, Duration),
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let Some(delay) = self.next_delay(retries, &error) else {
                        debug!(retries, kind = %error.kind(), "Giving up");
                        return Err(error);
                    };
                    retries += 1;
                    on_retry(retries, &error, delay);
                    sleep(delay).await;
                }
            }
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self::fixed(settings.max_retries, settings.backoff())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
