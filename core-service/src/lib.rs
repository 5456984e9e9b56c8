//! Core service façade.
//!
//! Wires a validated [`CoreConfig`] into the auth and onboarding components
//! and exposes everything a host UI needs through one handle:
//!
//! - the reactive [`AuthSnapshot`] (`snapshot` / `subscribe`) and the event
//!   stream
//! - credential operations, callback completion and password adoption
//! - route decisions combining the password and onboarding gates
//! - the onboarding wizard and its completion
//!
//! Desktop hosts enable the `desktop-shims` feature so `core-runtime`
//! fills in SQLite storage, a TCP connectivity probe and a tracing-backed
//! error tracker when those bridges are not supplied.
//!
//! ```ignore
//! use core_runtime::config::{AuthSettings, CoreConfig};
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .identity_backend(identity)
//!     .profile_store(profiles)
//!     .auth_settings(AuthSettings::new("https://portal.example.com"))
//!     .build()?;
//! let core = CoreService::new(config)?;
//!
//! let decision = core.evaluate_route("/dashboard");
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::identity::SessionChangeKind;
use core_async::runtime::Handle;
use core_async::sync::{broadcast, watch, MappedMutexGuard, Mutex, MutexGuard};
use core_auth::{
    AuthError, AuthSnapshot, CallbackHandler, CallbackParams, CallbackState, CredentialFlow,
    FailureReporter, ListenerGuard, PasswordGate, PasswordValidator, RetryPolicy, RouteDecision,
    RouteGuard, Session, SessionStore, SignUpOutcome,
};
use core_onboarding::{
    DraftStore, OnboardingDraft, OnboardingGate, OnboardingWizard, ProfileSyncEngine,
    UserDataPatch, WizardStep,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

/// Builds a [`CoreService`] from a validated configuration.
pub struct CoreServiceBuilder {
    config: CoreConfig,
    callback_retry: Option<RetryPolicy>,
}

impl CoreServiceBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            callback_retry: None,
        }
    }

    /// Override the callback retry policy derived from the auth settings.
    pub fn callback_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.callback_retry = Some(policy);
        self
    }

    /// Wire every component and start the session store.
    ///
    /// Must run inside a Tokio runtime: the session store restores and
    /// listens on a spawned task.
    pub fn build(self) -> Result<CoreService> {
        if Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "CoreService must be built inside a Tokio runtime".to_string(),
            ));
        }
        let config = self.config;
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let reporter = FailureReporter::new(config.error_tracker.clone(), event_bus.clone());
        let sessions = Arc::new(SessionStore::start_with_clock(
            config.identity_backend.clone(),
            reporter.clone(),
            config.clock.clone(),
        ));
        let validator = PasswordValidator::new(config.password_policy);

        let mut credentials = CredentialFlow::new(
            config.identity_backend.clone(),
            sessions.clone(),
            config.key_value_store.clone(),
            reporter.clone(),
            validator.clone(),
            config.auth.clone(),
        );
        if let Some(monitor) = &config.network_monitor {
            credentials = credentials.with_network_monitor(monitor.clone());
        }

        let mut callback = CallbackHandler::new(sessions.clone(), reporter.clone(), &config.auth);
        if let Some(policy) = self.callback_retry {
            callback = callback.with_retry_policy(policy);
        }

        let password = PasswordGate::new(
            config.identity_backend.clone(),
            sessions.clone(),
            reporter,
            validator,
        );
        let sync = ProfileSyncEngine::new(
            config.profile_store.clone(),
            config.identity_backend.clone(),
            config.clock.clone(),
        );

        info!(site_url = %config.auth.site_url, "Core service started");
        Ok(CoreService {
            inner: Arc::new(ServiceInner {
                router: RouteGuard::new(config.auth.routes.clone()),
                onboarding_gate: OnboardingGate::new(config.auth.routes.clone()),
                event_bus,
                sessions,
                credentials,
                callback,
                password,
                sync,
                wizard: Mutex::new(None),
                config,
            }),
        })
    }
}

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    sessions: Arc<SessionStore>,
    credentials: CredentialFlow,
    callback: CallbackHandler,
    password: PasswordGate,
    router: RouteGuard,
    onboarding_gate: OnboardingGate,
    sync: ProfileSyncEngine,
    wizard: Mutex<Option<OnboardingWizard>>,
}

/// Primary façade exposed to host applications. Clones share state.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Shorthand for `CoreServiceBuilder::new(config).build()`.
    pub fn new(config: CoreConfig) -> Result<Self> {
        CoreServiceBuilder::new(config).build()
    }

    pub fn builder(config: CoreConfig) -> CoreServiceBuilder {
        CoreServiceBuilder::new(config)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.sessions.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.sessions.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// The current session, waiting for the startup restore if needed.
    pub async fn current_session(&self) -> Option<Session> {
        self.inner.sessions.current_session().await
    }

    pub fn on_session_change<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(SessionChangeKind, Option<&Session>) + Send + Sync + 'static,
    {
        self.inner.sessions.on_session_change(listener)
    }

    /// Stop the session listener. Later operations still work on the last
    /// known state.
    pub fn shutdown(&self) {
        self.inner.sessions.shutdown();
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        Ok(self
            .inner
            .credentials
            .sign_in_with_password(email, password)
            .await?)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile_seed: Map<String, Value>,
    ) -> Result<SignUpOutcome> {
        Ok(self
            .inner
            .credentials
            .sign_up(email, password, profile_seed)
            .await?)
    }

    pub async fn request_one_time_code(&self, email: &str) -> Result<()> {
        Ok(self.inner.credentials.request_one_time_code(email).await?)
    }

    pub async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        Ok(self.inner.credentials.reset_password_for_email(email).await?)
    }

    /// Sign out and close any open wizard. The persisted draft is kept.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.wizard.lock().await.take();
        Ok(self.inner.credentials.sign_out().await?)
    }

    // ------------------------------------------------------------------
    // Callback
    // ------------------------------------------------------------------

    /// Complete the emailed-link callback that landed on `url`.
    pub async fn complete_callback(&self, url: &str) -> CallbackState {
        let params = CallbackParams::from_url(url).unwrap_or_else(|err| {
            warn!(error = %err, "Unparseable callback URL, ignoring its parameters");
            CallbackParams::default()
        });
        self.inner.callback.complete(&params).await
    }

    /// "Try Again" on the callback failure screen.
    pub async fn retry_callback(&self) -> CallbackState {
        self.inner.callback.retry().await
    }

    pub fn callback_state(&self) -> CallbackState {
        self.inner.callback.state()
    }

    pub fn subscribe_callback(&self) -> watch::Receiver<CallbackState> {
        self.inner.callback.subscribe()
    }

    /// "Return to Login" on the callback failure screen.
    pub fn login_destination(&self) -> &str {
        self.inner.callback.login_destination()
    }

    // ------------------------------------------------------------------
    // Password adoption
    // ------------------------------------------------------------------

    pub fn has_set_password(&self) -> bool {
        self.inner.password.has_set_password()
    }

    /// Adopt `password` and return where the host should navigate next.
    pub async fn update_user_password(
        &self,
        password: &str,
        return_to: Option<&str>,
    ) -> Result<String> {
        self.inner.password.update_user_password(password).await?;

        let snapshot = self.snapshot();
        let principal = snapshot.principal().ok_or(AuthError::NotAuthenticated)?;
        Ok(self
            .inner
            .router
            .after_password_adoption(principal, return_to))
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    pub fn route_guard(&self) -> &RouteGuard {
        &self.inner.router
    }

    pub fn evaluate_route(&self, requested: &str) -> RouteDecision {
        self.inner.router.evaluate(&self.snapshot(), requested)
    }

    pub fn requires_onboarding(&self) -> bool {
        self.inner
            .onboarding_gate
            .requires_onboarding(&self.snapshot())
    }

    // ------------------------------------------------------------------
    // Onboarding
    // ------------------------------------------------------------------

    /// Open (or reopen) the wizard for the signed-in principal, resuming
    /// the persisted draft.
    #[instrument(skip_all)]
    pub async fn open_onboarding(&self) -> Result<OnboardingDraft> {
        let session = self
            .current_session()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        let drafts = DraftStore::new(
            self.inner.config.key_value_store.clone(),
            self.inner.config.onboarding.clone(),
        );
        let wizard = OnboardingWizard::open(
            drafts,
            Some(&session.principal),
            self.inner.event_bus.clone(),
            self.inner.config.error_tracker.clone(),
        )
        .await;

        let draft = wizard.draft().clone();
        *self.inner.wizard.lock().await = Some(wizard);
        Ok(draft)
    }

    pub async fn onboarding_draft(&self) -> Option<OnboardingDraft> {
        self.inner
            .wizard
            .lock()
            .await
            .as_ref()
            .map(|wizard| wizard.draft().clone())
    }

    pub async fn is_onboarding_email_locked(&self) -> Result<bool> {
        Ok(self.wizard().await?.is_email_locked())
    }

    pub async fn update_onboarding_data(&self, patch: UserDataPatch) -> Result<OnboardingDraft> {
        let mut wizard = self.wizard().await?;
        wizard.update_user_data(patch).await;
        Ok(wizard.draft().clone())
    }

    pub async fn onboarding_next(&self) -> Result<WizardStep> {
        Ok(self.wizard().await?.next().await?)
    }

    pub async fn onboarding_back(&self) -> Result<WizardStep> {
        Ok(self.wizard().await?.back().await?)
    }

    pub async fn onboarding_skip(&self) -> Result<WizardStep> {
        Ok(self.wizard().await?.skip().await?)
    }

    pub async fn onboarding_jump_to(&self, step: WizardStep) -> Result<WizardStep> {
        Ok(self.wizard().await?.jump_to(step).await?)
    }

    /// Commit the wizard and return the post-onboarding destination.
    ///
    /// The principal returned by the metadata write is applied to the
    /// session store, so the snapshot reflects completion immediately.
    #[instrument(skip_all)]
    pub async fn complete_onboarding(&self) -> Result<String> {
        let session = self
            .current_session()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        let outcome = {
            let mut wizard = self.wizard().await?;
            wizard.complete(&self.inner.sync, &session.principal).await?
        };

        if let Err(err) = self.inner.sessions.apply_user(outcome.user) {
            warn!(error = %err, "Completed onboarding but could not refresh the session");
        }
        self.inner.wizard.lock().await.take();
        Ok(self.inner.onboarding_gate.after_completion().to_string())
    }

    async fn wizard(&self) -> Result<MappedMutexGuard<'_, OnboardingWizard>> {
        MutexGuard::try_map(self.inner.wizard.lock().await, Option::as_mut)
            .map_err(|_| CoreError::WizardNotOpen)
    }
}
