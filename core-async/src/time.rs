//! Time-related abstractions.
//!
//! Re-exports Tokio's timer primitives so that tests can pause and advance
//! virtual time (`tokio::time::pause`) for every consumer at once: the
//! one-time-code timeout and the callback retry backoff both sleep through
//! this module.
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! # async fn example() {
//! let start = Instant::now();
//! sleep(Duration::from_millis(10)).await;
//! assert!(start.elapsed() >= Duration::from_millis(10));
//! # }
//! ```

pub use tokio::time::{
    error::Elapsed, interval, sleep, sleep_until, timeout, Instant, Interval, Sleep,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current time as milliseconds since `UNIX_EPOCH`.
///
/// A clock set before the epoch yields `0` rather than panicking.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current time as seconds since `UNIX_EPOCH`.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}
