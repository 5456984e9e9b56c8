//! Async abstraction layer for the practice portal core.
//!
//! Domain crates (`core-auth`, `core-onboarding`) depend on this crate instead
//! of reaching for Tokio directly. Keeping the surface in one place means a
//! browser host only has to swap this crate's backing executor, not every
//! call site that sleeps, waits on a timer or guards a request with a
//! cancellation token.
//!
//! # Modules
//!
//! - `task`: Task spawning and owned background workers
//! - `time`: Sleep, timeouts, instants and wall-clock helpers
//! - `sync`: Async-aware locks and channels (`watch`, `broadcast`, ...)
//! - `cancel`: Cooperative cancellation tokens and deadline-bound futures
//!
//! [`join!`] is re-exported for awaiting several futures on one task.
//!
//! # Examples
//!
//! ```rust
//! use core_async::cancel::{with_deadline, CancellationToken, DeadlineError};
//! use core_async::time::Duration;
//!
//! # async fn example() {
//! let token = CancellationToken::new();
//! let outcome = with_deadline(Duration::from_secs(15), &token, async { 42 }).await;
//! assert_eq!(outcome, Ok(42));
//! # let _ = DeadlineError::TimedOut;
//! # }
//! ```

pub mod cancel;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use cancel::CancellationToken;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use tokio::join;
