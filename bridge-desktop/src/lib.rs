//! # Desktop Bridge Implementations
//!
//! Default implementations of the host-capability bridge traits for desktop
//! shells (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `KeyValueStore` backed by a single SQLite table (the desktop stand-in
//!   for browser `localStorage`)
//! - `NetworkMonitor` using a short TCP reachability probe
//! - `ErrorTracker` that forwards reports to `tracing`
//!
//! The identity backend and the profile store are network collaborators and
//! have no desktop default; hosts inject their own adapters.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, SqliteKeyValueStore, TracingErrorTracker};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = SqliteKeyValueStore::new(SqliteKeyValueStore::default_path()).await?;
//!     let network = DesktopNetworkMonitor::new();
//!     let tracker = TracingErrorTracker;
//!
//!     // Use in core configuration
//! }
//! ```

mod key_value;
mod network;
mod telemetry;

pub use key_value::SqliteKeyValueStore;
pub use network::DesktopNetworkMonitor;
pub use telemetry::TracingErrorTracker;
