//! Error-tracking collaborator.
//!
//! Every classified failure in the core is reported here tagged with the
//! operation it originated from. Reporting is fire-and-forget: the trait is
//! synchronous, cannot fail, and implementations must not block the caller
//! (queue or spawn internally if delivery is slow).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


/// A single error report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Call site tag, e.g. `"credentials.request_one_time_code"`.
    pub origin: String,
    /// Classified error kind, e.g. `"network_unreachable"`.
    pub kind: String,
    /// Human-readable message (never contains secrets).
    pub message: String,
    /// Extra diagnostic context.
    pub context: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(
        origin: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            kind: kind.into(),
            message: message.into(),
            context: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error-tracking sink (Sentry, LogRocket, host console, ...).
pub trait ErrorTracker: Send + Sync {
    fn track_error(&self, report: ErrorReport);
}

/// Tracker that drops every report.
#[derive(Debug, Clone, Default)]
pub struct NoopErrorTracker;

impl ErrorTracker for NoopErrorTracker {
    fn track_error(&self, _report: ErrorReport) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<ErrorReport>>);

    impl ErrorTracker for Recording {
        fn track_error(&self, report: ErrorReport) {
            self.0.lock().unwrap().push(report);
        }
    }

    #[test]
    fn test_report_builder() {
        let report = ErrorReport::new("session.restore", "network_unreachable", "Failed to fetch")
            .with_context("online", "false");

        assert_eq!(report.origin, "session.restore");
        assert_eq!(report.kind, "network_unreachable");
        assert_eq!(report.context.get("online"), Some(&"false".to_string()));
    }

    #[test]
    fn test_tracker_receives_reports() {
        let tracker = Recording::default();
        tracker.track_error(ErrorReport::new("a", "b", "c"));
        NoopErrorTracker.track_error(ErrorReport::new("a", "b", "c"));
        assert_eq!(tracker.0.lock().unwrap().len(), 1);
    }
}
