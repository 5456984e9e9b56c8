//! Network Monitoring Abstraction
//!
//! Provides connectivity information. The credential flow consults it before
//! issuing a one-time-code request and records it as diagnostics.

use crate::error::Result;

/// Network connection type hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Cellular => "cellular",
            NetworkType::WiFi => "wifi",
            NetworkType::Ethernet => "ethernet",
            NetworkType::Other => "other",
        }
    }
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// Effective connection quality hint (e.g. `"4g"`, `"slow-2g"`)
    pub effective_type: Option<String>,
    /// Protocol the host page was served over (e.g. `"https:"`)
    pub protocol: Option<String>,
}

impl NetworkInfo {
    /// Info for a host that only knows the online flag.
    pub fn from_online_flag(online: bool) -> Self {
        Self {
            status: if online {
                NetworkStatus::Connected
            } else {
                NetworkStatus::Disconnected
            },
            network_type: None,
            effective_type: None,
            protocol: None,
        }
    }
}

/// Network monitor trait
///
/// # Platform Support
///
/// - **Web**: `navigator.onLine` + Network Information API (`connection.effectiveType`)
/// - **Desktop**: TCP reachability probe
///
/// `Indeterminate` must not be reported as offline: only a definite
/// `Disconnected` short-circuits network calls.
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Whether the platform reports online connectivity.
    ///
    /// Probe failures count as online so a broken monitor never blocks
    /// sign-in on its own.
    async fn is_online(&self) -> bool {
        !matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Disconnected,
                ..
            })
        )
    }
}
