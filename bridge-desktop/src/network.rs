//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Desktop network monitor implementation
///
/// Opens a TCP connection to a well-known endpoint to decide connectivity.
/// A probe that neither connects nor fails within the timeout reports
/// `Indeterminate`, which the core treats as online.
///
/// Note: Platform-specific implementations (Linux netlink, macOS
/// SystemConfiguration, Windows WinAPI) would also yield the link type.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Probe a different endpoint (e.g. the identity backend's host).
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
        }
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Indeterminate,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            // Wired vs. wireless needs platform APIs
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            effective_type: None,
            protocol: None,
        };

        debug!(status = ?status, probe = %self.probe_addr, "Network info updated");
        Ok(info)
    }
}
