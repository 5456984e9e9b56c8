//! Error tracking via `tracing`.

use bridge_traits::telemetry::{ErrorReport, ErrorTracker};
use tracing::error;

/// Forwards every report to the `tracing` pipeline at `ERROR` level.
///
/// Hosts without a dedicated error service get their reports in the same
/// log stream as everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorTracker;

impl ErrorTracker for TracingErrorTracker {
    fn track_error(&self, report: ErrorReport) {
        let context = report
            .context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        error!(
            target: "error_tracker",
            origin = %report.origin,
            kind = %report.kind,
            occurred_at = %report.occurred_at,
            context = %context,
            "{}",
            report.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_error_without_subscriber() {
        let report = ErrorReport::new("session.restore", "timeout", "timed out")
            .with_context("attempt", "1");
        TracingErrorTracker.track_error(report);
    }
}
