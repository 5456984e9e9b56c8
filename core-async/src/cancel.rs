//! Cooperative cancellation.
//!
//! A request guarded by [`with_deadline`] races three things: the work
//! itself, a timer, and an external [`CancellationToken`]. When the timer
//! wins, the token is cancelled so any collaborator holding a clone of it
//! (for example an HTTP adapter that aborts its in-flight fetch) observes
//! the same decision, and the late result is dropped with the losing future.

use std::fmt;
use std::future::Future;

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::time::{sleep, Duration};

/// Why a deadline-bound future did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineError {
    /// The deadline elapsed first; the token has been cancelled.
    TimedOut,
    /// Somebody else cancelled the token before the work finished.
    Cancelled,
}

impl fmt::Display for DeadlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineError::TimedOut => write!(f, "operation timed out"),
            DeadlineError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for DeadlineError {}

/// Runs `future` until it completes, `deadline` elapses, or `token` is
/// cancelled, whichever happens first.
///
/// On timeout the token is cancelled before returning.
pub async fn with_deadline<F>(
    deadline: Duration,
    token: &CancellationToken,
    future: F,
) -> Result<F::Output, DeadlineError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(DeadlineError::Cancelled),
        output = future => Ok(output),
        _ = sleep(deadline) => {
            token.cancel();
            Err(DeadlineError::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_completes_before_timer() {
        let token = CancellationToken::new();
        let result = with_deadline(Duration::from_secs(1), &token, async { 7 }).await;
        assert_eq!(result, Ok(7));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_and_cancels_token() {
        let token = CancellationToken::new();
        let result = with_deadline(Duration::from_secs(15), &token, async {
            sleep(Duration::from_secs(60)).await;
            1
        })
        .await;

        assert_eq!(result, Err(DeadlineError::TimedOut));
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = with_deadline(Duration::from_secs(15), &token, async { 1 }).await;
        assert_eq!(result, Err(DeadlineError::Cancelled));
    }
}
