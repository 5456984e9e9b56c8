//! # Credential Flow Engine
//!
//! Password sign-in, sign-up, passwordless one-time codes, password reset
//! requests and sign-out.
//!
//! ## One-time codes
//!
//! [`CredentialFlow::request_one_time_code`] is the primary login path and
//! the one most exposed to flaky networks, so it runs in stages:
//!
//! 1. collect network diagnostics (observability only, never blocking),
//!    failing fast when the host explicitly reports being offline
//! 2. clear stale auth artifacts from the key-value store
//! 3. send the request bound to a cancellable deadline
//! 4. notify success, or classify and report the failure
//!
//! Nothing here retries automatically.

use std::sync::Arc;

use bridge_traits::identity::{IdentityBackend, OneTimeCodeOptions};
use bridge_traits::network::NetworkMonitor;
use bridge_traits::storage::KeyValueStore;
use core_async::cancel::{with_deadline, CancellationToken, DeadlineError};
use core_runtime::config::AuthSettings;
use core_runtime::events::{AuthEvent, CoreEvent, Notice};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::diagnostics::{classify, FailureReporter, NetworkDiagnostics};
use crate::error::{AuthError, Result};
use crate::password::{PasswordRequirement, PasswordValidator};
use crate::session::SessionStore;
use crate::types::Session;

/// What a sign-up attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The backend issued a session straight away.
    SignedIn(Session),
    /// The account exists but the email must be confirmed first.
    ConfirmationRequired,
    /// The password failed the local strength check; nothing was sent.
    Rejected(Vec<PasswordRequirement>),
}

pub struct CredentialFlow {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
    key_value: Arc<dyn KeyValueStore>,
    network: Option<Arc<dyn NetworkMonitor>>,
    reporter: FailureReporter,
    validator: PasswordValidator,
    settings: AuthSettings,
}

impl CredentialFlow {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<SessionStore>,
        key_value: Arc<dyn KeyValueStore>,
        reporter: FailureReporter,
        validator: PasswordValidator,
        settings: AuthSettings,
    ) -> Self {
        Self {
            backend,
            store,
            key_value,
            network: None,
            reporter,
            validator,
            settings,
        }
    }

    /// Use `monitor` for the online check and diagnostics. Without one the
    /// host is assumed online.
    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(monitor);
        self
    }

    #[instrument(skip_all)]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        const OP: &str = "auth.sign_in";

        let email = self.checked_email(OP, email)?;
        if password.is_empty() {
            return Err(self.fail(OP, AuthError::Validation("Password is required.".into())));
        }

        let session = self
            .backend
            .sign_in_with_password(&email, password)
            .await
            .map_err(|err| classify(&err))
            .and_then(Session::try_from)
            .map_err(|err| self.fail(OP, err))?;

        self.store
            .apply_session(session)
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Create an account. A weak password is rejected locally with a notice
    /// and reported as [`SignUpOutcome::Rejected`] rather than an error.
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile_seed: Map<String, Value>,
    ) -> Result<SignUpOutcome> {
        const OP: &str = "auth.sign_up";

        let email = self.checked_email(OP, email)?;
        let unmet = self.validator.check(password);
        if !unmet.is_empty() {
            if let Err(err) = self.validator.validate(password) {
                self.reporter.report(OP, &err);
            }
            return Ok(SignUpOutcome::Rejected(unmet));
        }

        let result = self
            .backend
            .sign_up(&email, password, profile_seed)
            .await
            .map_err(|err| self.fail(OP, classify(&err)))?;

        match result.session {
            Some(session) => {
                let session = Session::try_from(session).map_err(|err| self.fail(OP, err))?;
                let session = self
                    .store
                    .apply_session(session)
                    .ok_or(AuthError::NotAuthenticated)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => {
                info!("Sign-up awaiting email confirmation");
                self.reporter.event_bus().notify(Notice::info(
                    "Check your email",
                    "Confirm your email address to finish creating your account.",
                ));
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    /// Email a one-time code (magic link) to `email`.
    #[instrument(skip_all)]
    pub async fn request_one_time_code(&self, email: &str) -> Result<()> {
        const OP: &str = "auth.one_time_code";

        let email = self.checked_email(OP, email)?;

        let diagnostics = NetworkDiagnostics::collect(self.network.as_deref()).await;
        debug!(?diagnostics, "Network diagnostics before one-time-code request");
        if diagnostics.is_offline() {
            let err = AuthError::NetworkUnreachable("Host reports no network connection".into());
            self.reporter.report_with(OP, &err, Some(&diagnostics));
            return Err(err);
        }

        self.clear_stale_artifacts().await;

        let options = OneTimeCodeOptions {
            create_if_missing: self.settings.allow_sign_up_on_demand,
            redirect_url: self.settings.redirect_url(&self.settings.routes.callback),
        };
        let timeout = self.settings.one_time_code_timeout();
        let token = CancellationToken::new();
        let request = self
            .backend
            .sign_in_with_one_time_code(&email, &options, token.clone());

        let err = match with_deadline(timeout, &token, request).await {
            Ok(Ok(())) => {
                let minutes = self.settings.one_time_code_validity_minutes;
                info!(valid_for_minutes = minutes, "One-time code sent");
                let bus = self.reporter.event_bus();
                let _ = bus.emit(CoreEvent::Auth(AuthEvent::OneTimeCodeSent {
                    valid_for_minutes: minutes,
                }));
                bus.notify(Notice::success(
                    "Check your email",
                    format!(
                        "We sent a sign-in link to your inbox. It expires in {} minutes.",
                        minutes
                    ),
                ));
                return Ok(());
            }
            Ok(Err(err)) => classify(&err),
            Err(DeadlineError::TimedOut) => AuthError::Timeout(format!(
                "No response to the one-time-code request within {}s",
                timeout.as_secs()
            )),
            Err(DeadlineError::Cancelled) => {
                AuthError::Timeout("One-time-code request was cancelled".into())
            }
        };

        self.reporter.report_with(OP, &err, Some(&diagnostics));
        Err(err)
    }

    /// Send a password-reset email whose link lands on the set-password route.
    #[instrument(skip_all)]
    pub async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        const OP: &str = "auth.reset_password";

        let email = self.checked_email(OP, email)?;
        let redirect_url = self
            .settings
            .redirect_url(&self.settings.routes.set_password);

        self.backend
            .reset_password_for_email(&email, &redirect_url)
            .await
            .map_err(|err| self.fail(OP, classify(&err)))?;

        self.reporter.event_bus().notify(Notice::success(
            "Check your email",
            "If an account exists for this address, a password reset link is on its way.",
        ));
        Ok(())
    }

    /// Sign out. Local state is cleared even when the backend call fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(err) = self.backend.sign_out().await {
            self.reporter.track("auth.sign_out", &classify(&err), None);
        }
        self.store.clear();
        Ok(())
    }

    async fn clear_stale_artifacts(&self) {
        let prefix = &self.settings.auth_storage_prefix;
        let keys = match self.key_value.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "Could not list stored auth artifacts");
                return;
            }
        };

        for key in keys.iter().filter(|key| key.starts_with(prefix.as_str())) {
            match self.key_value.remove(key).await {
                Ok(()) => debug!(key = %key, "Cleared stale auth artifact"),
                Err(err) => warn!(key = %key, error = %err, "Could not clear auth artifact"),
            }
        }
    }

    fn checked_email(&self, operation: &str, email: &str) -> Result<String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(self.fail(operation, AuthError::Validation("Email is required.".into())));
        }
        if !email.contains('@') {
            return Err(self.fail(
                operation,
                AuthError::Validation("Enter a valid email address.".into()),
            ));
        }
        Ok(email.to_lowercase())
    }

    fn fail(&self, operation: &str, err: AuthError) -> AuthError {
        self.reporter.report(operation, &err);
        err
    }
}
