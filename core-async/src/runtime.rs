//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates use [`Handle::try_current`] to detect whether they are
//! already inside an executor and [`block_on`] for the rare synchronous entry
//! points (log forwarding outside of a runtime).

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread
/// runtime.
///
/// Returns `None` when the runtime cannot be constructed (for example when
/// the host has exhausted its file descriptors), so callers decide how to
/// degrade instead of panicking.
pub fn block_on<F>(future: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()
        .map(|runtime| runtime.block_on(future))
}
