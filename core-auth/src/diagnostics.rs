//! Failure classification and reporting shared by every auth flow.
//!
//! Backends surface failures as free-form strings ("Failed to fetch",
//! "Signups not allowed for otp", "Database error finding user"). This
//! module turns those into [`AuthError`] variants carrying actionable
//! guidance, and funnels every classified failure through one
//! [`FailureReporter`] so logging, error tracking, events and user notices
//! stay consistent across call sites.

use std::sync::Arc;

use bridge_traits::error::BackendError;
use bridge_traits::network::{NetworkInfo, NetworkMonitor, NetworkStatus};
use bridge_traits::telemetry::{ErrorReport, ErrorTracker};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, Notice};
use tracing::{debug, warn};

use crate::error::AuthError;

const INVALID_ACCOUNT: &[&str] = &["signups not allowed", "signup is disabled", "user not found"];
const MISCONFIGURED: &[&str] = &["database error finding user", "error finding user"];
const EXPIRED: &[&str] = &["otp_expired", "expired", "already been used", "invalid or has expired"];
const RATE_LIMITED: &[&str] = &[
    "rate limit",
    "too many requests",
    "only request this after",
    "over_email_send_rate_limit",
];
const TIMEOUT: &[&str] = &["timeout", "timed out", "aborted"];
const NETWORK: &[&str] = &[
    "failed to fetch",
    "network",
    "load failed",
    "dns",
    "cors",
    "connection refused",
    "err_name_not_resolved",
];
const INVALID_CREDENTIALS: &[&str] = &["invalid login credentials", "invalid_grant"];

/// Map a backend failure onto the auth error taxonomy.
///
/// Matching is on the lower-cased message plus the backend's error code;
/// the first family that matches wins, in the order above. HTTP 429 is
/// always rate limiting.
pub fn classify(err: &BackendError) -> AuthError {
    let haystack = format!(
        "{} {}",
        err.message.to_lowercase(),
        err.code.as_deref().unwrap_or_default().to_lowercase()
    );
    let matches = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));
    let message = err.message.clone();

    if err.status == Some(429) || matches(RATE_LIMITED) {
        AuthError::RateLimited(message)
    } else if matches(INVALID_ACCOUNT) {
        AuthError::InvalidAccount(message)
    } else if matches(MISCONFIGURED) {
        AuthError::BackendMisconfigured(message)
    } else if matches(EXPIRED) {
        AuthError::CodeExpired(message)
    } else if matches(TIMEOUT) {
        AuthError::Timeout(message)
    } else if matches(NETWORK) {
        AuthError::NetworkUnreachable(message)
    } else if matches(INVALID_CREDENTIALS) {
        AuthError::InvalidCredentials(message)
    } else {
        AuthError::BackendUnknown(message)
    }
}

/// Connectivity facts collected before a network-sensitive request.
///
/// Purely observational: the values are attached to error reports and
/// logs. Only a definite offline flag changes behavior (the caller fails
/// fast without contacting the backend).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDiagnostics {
    /// `None` when the platform offers no monitor or the probe failed.
    pub online: Option<bool>,
    pub connection_type: Option<String>,
    pub effective_type: Option<String>,
    pub protocol: Option<String>,
}

impl NetworkDiagnostics {
    pub async fn collect(monitor: Option<&dyn NetworkMonitor>) -> Self {
        let Some(monitor) = monitor else {
            return Self::default();
        };

        match monitor.get_network_info().await {
            Ok(info) => Self::from(info),
            Err(err) => {
                debug!(error = %err, "Network diagnostics unavailable");
                Self::default()
            }
        }
    }

    /// Only an explicit offline report counts.
    pub fn is_offline(&self) -> bool {
        self.online == Some(false)
    }

    fn attach(&self, mut report: ErrorReport) -> ErrorReport {
        let fields = [
            ("online", self.online.map(|o| o.to_string())),
            ("connection_type", self.connection_type.clone()),
            ("effective_type", self.effective_type.clone()),
            ("protocol", self.protocol.clone()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                report = report.with_context(key, value);
            }
        }
        report
    }
}

impl From<NetworkInfo> for NetworkDiagnostics {
    fn from(info: NetworkInfo) -> Self {
        Self {
            online: match info.status {
                NetworkStatus::Connected => Some(true),
                NetworkStatus::Disconnected => Some(false),
                NetworkStatus::Indeterminate => None,
            },
            connection_type: info.network_type.map(|t| t.as_str().to_string()),
            effective_type: info.effective_type,
            protocol: info.protocol,
        }
    }
}

/// Single exit point for failures of auth operations.
///
/// Non-validation errors are logged, tracked with their origin, published
/// as `AuthEvent::AuthError` and surfaced as an error notice. Validation
/// errors only produce a notice: they never left the client.
#[derive(Clone)]
pub struct FailureReporter {
    tracker: Arc<dyn ErrorTracker>,
    event_bus: EventBus,
}

impl FailureReporter {
    pub fn new(tracker: Arc<dyn ErrorTracker>, event_bus: EventBus) -> Self {
        Self { tracker, event_bus }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Report `error` raised by `operation` and surface it to the user.
    pub fn report(&self, operation: &str, error: &AuthError) {
        self.report_with(operation, error, None);
    }

    pub fn report_with(
        &self,
        operation: &str,
        error: &AuthError,
        diagnostics: Option<&NetworkDiagnostics>,
    ) {
        if let AuthError::Validation(reason) = error {
            debug!(operation, reason = %reason, "Rejected locally");
            self.event_bus.notify(Notice::warning(error.title(), reason.clone()));
            return;
        }

        self.track(operation, error, diagnostics);
        self.event_bus
            .notify(Notice::error(error.title(), error.user_message()));
    }

    /// Log, track and publish without a user notice (background failures).
    pub fn track(&self, operation: &str, error: &AuthError, diagnostics: Option<&NetworkDiagnostics>) {
        warn!(operation, kind = %error.kind(), error = %error, "Auth operation failed");

        let mut report = ErrorReport::new(operation, error.kind().as_str(), error.to_string());
        if let Some(diagnostics) = diagnostics {
            report = diagnostics.attach(report);
        }
        self.tracker.track_error(report);

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            operation: operation.to_string(),
            kind: error.kind().as_str().to_string(),
            message: error.to_string(),
            recoverable: error.is_transient(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;
    use bridge_traits::network::NetworkType;
    use crate::testing::RecordingTracker;

    fn kind_of(message: &str) -> AuthErrorKind {
        classify(&BackendError::new(message)).kind()
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            ("Signups not allowed for otp", AuthErrorKind::InvalidAccount),
            ("User not found", AuthErrorKind::InvalidAccount),
            ("Database error finding user", AuthErrorKind::BackendMisconfigured),
            ("TypeError: Failed to fetch", AuthErrorKind::NetworkUnreachable),
            ("Load failed", AuthErrorKind::NetworkUnreachable),
            ("Email rate limit exceeded", AuthErrorKind::RateLimited),
            (
                "For security purposes, you can only request this after 42 seconds.",
                AuthErrorKind::RateLimited,
            ),
            ("The operation was aborted", AuthErrorKind::Timeout),
            ("Email link is invalid or has expired", AuthErrorKind::CodeExpired),
            ("Invalid login credentials", AuthErrorKind::InvalidCredentials),
            ("Something odd happened", AuthErrorKind::BackendUnknown),
        ];

        for (message, expected) in cases {
            assert_eq!(kind_of(message), expected, "message: {message}");
        }
    }

    #[test]
    fn test_status_and_code_participate() {
        let err = BackendError::new("Too Many").with_status(429);
        assert_eq!(classify(&err).kind(), AuthErrorKind::RateLimited);

        let err = BackendError::new("Token has expired").with_code("otp_expired");
        assert_eq!(classify(&err).kind(), AuthErrorKind::CodeExpired);
    }

    #[test]
    fn test_unknown_keeps_message_verbatim() {
        let err = classify(&BackendError::new("Custom SMTP failure"));
        assert_eq!(err, AuthError::BackendUnknown("Custom SMTP failure".to_string()));
    }

    #[test]
    fn test_diagnostics_from_network_info() {
        let diagnostics = NetworkDiagnostics::from(NetworkInfo {
            status: NetworkStatus::Connected,
            network_type: Some(NetworkType::WiFi),
            effective_type: Some("4g".to_string()),
            protocol: Some("https:".to_string()),
        });
        assert_eq!(diagnostics.online, Some(true));
        assert_eq!(diagnostics.connection_type.as_deref(), Some("wifi"));
        assert!(!diagnostics.is_offline());

        let offline = NetworkDiagnostics::from(NetworkInfo::from_online_flag(false));
        assert!(offline.is_offline());
    }

    #[tokio::test]
    async fn test_collect_without_monitor() {
        let diagnostics = NetworkDiagnostics::collect(None).await;
        assert_eq!(diagnostics, NetworkDiagnostics::default());
        assert!(!diagnostics.is_offline());
    }

    #[tokio::test]
    async fn test_reporter_tracks_and_notifies() {
        let tracker = Arc::new(RecordingTracker::default());
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let reporter = FailureReporter::new(tracker.clone(), bus.clone());

        let diagnostics = NetworkDiagnostics {
            online: Some(true),
            protocol: Some("https:".to_string()),
            ..Default::default()
        };
        reporter.report_with(
            "credentials.request_one_time_code",
            &AuthError::NetworkUnreachable("Failed to fetch".to_string()),
            Some(&diagnostics),
        );

        let reports = tracker.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].origin, "credentials.request_one_time_code");
        assert_eq!(reports[0].kind, "network_unreachable");
        assert_eq!(reports[0].context.get("protocol"), Some(&"https:".to_string()));

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::AuthError { recoverable: true, .. })
        ));
        assert!(matches!(events.recv().await.unwrap(), CoreEvent::Notice(_)));
    }

    #[tokio::test]
    async fn test_validation_is_not_tracked() {
        let tracker = Arc::new(RecordingTracker::default());
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let reporter = FailureReporter::new(tracker.clone(), bus);

        reporter.report("password.update", &AuthError::Validation("Too short".to_string()));

        assert!(tracker.reports().is_empty());
        match events.recv().await.unwrap() {
            CoreEvent::Notice(notice) => assert_eq!(notice.message, "Too short"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
