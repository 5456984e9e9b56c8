//! Synchronization primitives.
//!
//! Everything here is async-aware: holding a guard across an `.await` never
//! blocks the executor thread.
//!
//! ```rust
//! use core_async::sync::watch;
//!
//! # async fn example() {
//! let (tx, mut rx) = watch::channel(0u8);
//! tx.send_replace(1);
//! rx.changed().await.unwrap();
//! assert_eq!(*rx.borrow(), 1);
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, MappedMutexGuard, Mutex, MutexGuard, Notify, RwLock,
    RwLockReadGuard, RwLockWriteGuard,
};
