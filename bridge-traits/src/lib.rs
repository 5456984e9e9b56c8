//! # Host Bridge Traits
//!
//! Contracts between the practice portal core and everything it does not own.
//!
//! ## Overview
//!
//! Two families of traits live here:
//!
//! - **Host capabilities** that differ per platform (browser, desktop,
//!   mobile shell): durable key-value storage, connectivity, time, log
//!   forwarding and error tracking.
//! - **External collaborators** the core orchestrates but does not
//!   implement: the identity backend (sessions, one-time codes, user
//!   metadata) and the relational profile store.
//!
//! ## Traits
//!
//! ### Storage & Platform
//! - [`KeyValueStore`](storage::KeyValueStore) - Durable string storage (localStorage)
//! - [`NetworkMonitor`](network::NetworkMonitor) - Online flag and connection hints
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//! - [`ErrorTracker`](telemetry::ErrorTracker) - Fire-and-forget error reporting
//!
//! ### Collaborators
//! - [`IdentityBackend`](identity::IdentityBackend) - Email/password, one-time code, session, user metadata
//! - [`ProfileStore`](profile::ProfileStore) - Profile rows keyed by principal id
//!
//! ## Error Handling
//!
//! Host capabilities fail with [`BridgeError`](error::BridgeError).
//! Collaborators fail with [`BackendError`](error::BackendError), which keeps
//! the backend's message verbatim so the core can classify it.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` (session-change streams only `Send`)
//! so implementations can be shared across Tokio worker threads.

pub mod error;
pub mod identity;
pub mod network;
pub mod profile;
pub mod storage;
pub mod telemetry;
pub mod time;

pub use error::{BackendError, BackendResult, BridgeError};

// Re-export commonly used types
pub use identity::{
    BackendSession, BackendUser, IdentityBackend, OneTimeCodeOptions, SessionChange,
    SessionChangeKind, SessionChangeStream, SignUpResult, UserUpdate,
};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use profile::{ProfileRow, ProfileStore};
pub use storage::KeyValueStore;
pub use telemetry::{ErrorReport, ErrorTracker, NoopErrorTracker};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
