//! Password strength rules and the one-time password-adoption step.

use std::fmt;
use std::sync::Arc;

use bridge_traits::identity::{IdentityBackend, UserUpdate};
use core_runtime::config::PasswordPolicy;
use core_runtime::events::{AuthEvent, CoreEvent, Notice};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::diagnostics::{classify, FailureReporter};
use crate::error::{AuthError, Result};
use crate::session::SessionStore;
use crate::types::HAS_SET_PASSWORD;

/// A single unmet strength requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRequirement {
    MinLength(usize),
    Uppercase,
    Lowercase,
    Digit,
}

impl fmt::Display for PasswordRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordRequirement::MinLength(n) => write!(f, "at least {} characters", n),
            PasswordRequirement::Uppercase => f.write_str("one uppercase letter"),
            PasswordRequirement::Lowercase => f.write_str("one lowercase letter"),
            PasswordRequirement::Digit => f.write_str("one number"),
        }
    }
}

/// Local strength check shared by sign-up and password adoption.
///
/// # Examples
///
/// ```
/// use core_auth::{PasswordRequirement, PasswordValidator};
/// use core_runtime::config::PasswordPolicy;
///
/// let validator = PasswordValidator::new(PasswordPolicy::default());
/// assert!(validator.check("Sunrise42").is_empty());
/// assert_eq!(validator.check("sunrise42"), vec![PasswordRequirement::Uppercase]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PasswordValidator {
    policy: PasswordPolicy,
}

impl PasswordValidator {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// Every requirement `password` fails, in display order.
    pub fn check(&self, password: &str) -> Vec<PasswordRequirement> {
        let policy = &self.policy;
        let mut unmet = Vec::new();

        if password.chars().count() < policy.min_length {
            unmet.push(PasswordRequirement::MinLength(policy.min_length));
        }
        if policy.require_uppercase && !password.chars().any(char::is_uppercase) {
            unmet.push(PasswordRequirement::Uppercase);
        }
        if policy.require_lowercase && !password.chars().any(char::is_lowercase) {
            unmet.push(PasswordRequirement::Lowercase);
        }
        if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            unmet.push(PasswordRequirement::Digit);
        }
        unmet
    }

    /// Like [`check`](Self::check), as an [`AuthError::Validation`] listing
    /// the unmet requirements.
    pub fn validate(&self, password: &str) -> Result<()> {
        let unmet = self.check(password);
        if unmet.is_empty() {
            return Ok(());
        }

        let reasons: Vec<String> = unmet.iter().map(ToString::to_string).collect();
        Err(AuthError::Validation(format!(
            "Password must contain {}.",
            reasons.join(", ")
        )))
    }
}

/// Forces a password onto principals that signed in without one.
pub struct PasswordGate {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
    reporter: FailureReporter,
    validator: PasswordValidator,
}

impl PasswordGate {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<SessionStore>,
        reporter: FailureReporter,
        validator: PasswordValidator,
    ) -> Self {
        Self {
            backend,
            store,
            reporter,
            validator,
        }
    }

    /// Whether the signed-in principal has ever set a password.
    pub fn has_set_password(&self) -> bool {
        self.store.snapshot().has_set_password
    }

    /// Set the password and record the flag in the same backend write.
    ///
    /// Weak passwords are rejected before any network call.
    #[instrument(skip_all)]
    pub async fn update_user_password(&self, password: &str) -> Result<()> {
        if let Err(err) = self.validator.validate(password) {
            self.reporter.report("password.update", &err);
            return Err(err);
        }

        let Some(principal_id) = self.store.current_principal_id() else {
            let err = AuthError::NotAuthenticated;
            self.reporter.report("password.update", &err);
            return Err(err);
        };

        let mut metadata = Map::new();
        metadata.insert(HAS_SET_PASSWORD.to_string(), Value::Bool(true));
        let update = UserUpdate {
            password: Some(password.to_string()),
            metadata: Some(metadata),
        };

        let mut user = match self.backend.update_user(update).await {
            Ok(user) => user,
            Err(err) => {
                let err = classify(&err);
                self.reporter.report("password.update", &err);
                return Err(err);
            }
        };

        // The write succeeded; some backends echo the user before metadata merges.
        user.user_metadata
            .insert(HAS_SET_PASSWORD.to_string(), Value::Bool(true));
        self.store.apply_user(user)?;

        info!(principal = %principal_id, "Password adopted");
        let bus = self.reporter.event_bus();
        let _ = bus.emit(CoreEvent::Auth(AuthEvent::PasswordAdopted {
            principal_id: principal_id.to_string(),
        }));
        bus.notify(Notice::success(
            "Password set",
            "You can now sign in with your email and password.",
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flagged_session, reporter, FakeIdentity, RecordingTracker};
    use bridge_traits::error::BackendError;

    async fn gate(
        identity: Arc<FakeIdentity>,
    ) -> (PasswordGate, Arc<SessionStore>, Arc<RecordingTracker>) {
        let tracker = Arc::new(RecordingTracker::default());
        let reporter = reporter(tracker.clone());
        let store = Arc::new(SessionStore::start(identity.clone(), reporter.clone()));
        store.current_session().await;
        let gate = PasswordGate::new(identity, store.clone(), reporter, PasswordValidator::default());
        (gate, store, tracker)
    }

    #[tokio::test]
    async fn test_adoption_writes_password_and_flag_together() {
        let identity = Arc::new(FakeIdentity::with_session(flagged_session(false, false)));
        let (gate, store, _) = gate(identity.clone()).await;
        let mut events = gate.reporter.event_bus().subscribe();
        assert!(!gate.has_set_password());

        gate.update_user_password("Practice2024").await.unwrap();

        let updates = identity.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].password.as_deref(), Some("Practice2024"));
        assert_eq!(
            updates[0].metadata.as_ref().and_then(|m| m.get(HAS_SET_PASSWORD)),
            Some(&Value::Bool(true))
        );
        assert!(gate.has_set_password());
        assert!(store.snapshot().has_set_password);

        let mut adopted = false;
        while let Ok(event) = events.try_recv() {
            adopted |= matches!(event, CoreEvent::Auth(AuthEvent::PasswordAdopted { .. }));
        }
        assert!(adopted);
    }

    #[tokio::test]
    async fn test_weak_password_rejected_before_network() {
        let identity = Arc::new(FakeIdentity::with_session(flagged_session(false, false)));
        let (gate, _, tracker) = gate(identity.clone()).await;

        let err = gate.update_user_password("password").await.unwrap_err();

        assert!(matches!(err, AuthError::Validation(_)));
        assert!(identity.updates().is_empty());
        assert!(tracker.reports().is_empty());
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let (gate, _, _) = gate(Arc::new(FakeIdentity::new())).await;
        let err = gate.update_user_password("Practice2024").await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_flag_unset() {
        let identity = Arc::new(FakeIdentity::with_session(flagged_session(false, false)));
        identity.fail_update_user(BackendError::new(
            "New password should be different from the old password.",
        ));
        let (gate, _, tracker) = gate(identity).await;

        let err = gate.update_user_password("Practice2024").await.unwrap_err();

        assert!(matches!(err, AuthError::BackendUnknown(_)));
        assert!(!gate.has_set_password());
        assert_eq!(tracker.origins(), vec!["password.update".to_string()]);
    }

    fn validator() -> PasswordValidator {
        PasswordValidator::new(PasswordPolicy::default())
    }

    #[test]
    fn test_strong_password_passes() {
        assert!(validator().validate("Practice2024").is_ok());
    }

    #[test]
    fn test_every_unmet_requirement_is_listed() {
        let unmet = validator().check("abc");
        assert_eq!(
            unmet,
            vec![
                PasswordRequirement::MinLength(8),
                PasswordRequirement::Uppercase,
                PasswordRequirement::Digit,
            ]
        );
    }

    #[test]
    fn test_validation_message_names_reasons() {
        let err = validator().validate("ALLCAPS123").unwrap_err();
        match err {
            AuthError::Validation(message) => {
                assert!(message.contains("one lowercase letter"));
                assert!(!message.contains("uppercase"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 7 characters, 14 bytes
        assert!(validator()
            .check("Ääääää1")
            .contains(&PasswordRequirement::MinLength(8)));
    }

    #[test]
    fn test_relaxed_policy() {
        let relaxed = PasswordValidator::new(PasswordPolicy {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: true,
            require_digit: false,
        });
        assert!(relaxed.check("abcd").is_empty());
    }
}
