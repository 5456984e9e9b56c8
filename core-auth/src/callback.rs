//! # Callback Completion Handler
//!
//! Drives the screen the emailed link lands on:
//! `Loading → Redirecting | Failed`, and `Failed → Loading` on a manual retry.
//!
//! Errors carried in the callback URL itself are checked first; an expired
//! link fails straight away. Otherwise the session is fetched under the
//! configured [`RetryPolicy`] (3 retries, fixed 2s backoff by default) and
//! the principal's flags pick the next destination.

use std::sync::Arc;

use bridge_traits::error::BackendError;
use core_async::sync::watch;
use core_runtime::config::AuthSettings;
use core_runtime::events::Notice;
use tracing::{info, instrument, warn};
use url::Url;

use crate::diagnostics::{classify, FailureReporter};
use crate::error::{AuthError, Result, EXPIRED_CODE_GUIDANCE};
use crate::retry::RetryPolicy;
use crate::routing::RouteGuard;
use crate::session::SessionStore;

/// Error parameters the identity backend appends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Read error parameters from both the query string and the fragment.
    ///
    /// Relative URLs (`/auth/callback?error=...`) are accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_auth::CallbackParams;
    ///
    /// let params = CallbackParams::from_url(
    ///     "/auth/callback#error=access_denied&error_code=otp_expired",
    /// ).unwrap();
    /// assert!(params.is_expired());
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
                .and_then(|base| base.join(url))
                .map_err(|e| AuthError::Validation(format!("Invalid callback URL: {}", e)))?,
            Err(e) => {
                return Err(AuthError::Validation(format!("Invalid callback URL: {}", e)));
            }
        };

        let mut params = Self::default();
        let fragment = parsed.fragment().unwrap_or_default();
        let pairs = parsed
            .query_pairs()
            .chain(url::form_urlencoded::parse(fragment.as_bytes()));

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "error" => &mut params.error,
                "error_code" => &mut params.error_code,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }
        Ok(params)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some() || self.error_code.is_some() || self.error_description.is_some()
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.to_error(), Some(AuthError::CodeExpired(_)))
    }

    /// The classified error the parameters describe, if any.
    pub fn to_error(&self) -> Option<AuthError> {
        if !self.has_error() {
            return None;
        }

        let message = self
            .error_description
            .as_deref()
            .or(self.error.as_deref())
            .or(self.error_code.as_deref())
            .unwrap_or_default()
            .to_string();
        let mut backend = BackendError::new(message);
        if let Some(code) = &self.error_code {
            backend = backend.with_code(code.clone());
        }
        Some(classify(&backend))
    }
}

/// What the callback screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    /// Fetching the session; `attempt` counts retries so far.
    Loading { attempt: u32 },
    Redirecting { destination: String },
    Failed { message: String, expired: bool },
}

pub struct CallbackHandler {
    store: Arc<SessionStore>,
    reporter: FailureReporter,
    router: RouteGuard,
    policy: RetryPolicy,
    state: watch::Sender<CallbackState>,
}

impl CallbackHandler {
    pub fn new(store: Arc<SessionStore>, reporter: FailureReporter, settings: &AuthSettings) -> Self {
        let (state, _) = watch::channel(CallbackState::Loading { attempt: 0 });
        Self {
            store,
            reporter,
            router: RouteGuard::new(settings.routes.clone()),
            policy: RetryPolicy::from(settings.callback_retry),
            state,
        }
    }

    /// Replace the retry policy used while fetching the session.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> CallbackState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CallbackState> {
        self.state.subscribe()
    }

    /// Run the completion flow for a callback carrying `params`.
    #[instrument(skip_all)]
    pub async fn complete(&self, params: &CallbackParams) -> CallbackState {
        if let Some(err) = params.to_error() {
            warn!(kind = %err.kind(), "Callback URL carries an error");
            self.reporter.track("auth.callback", &err, None);
            return self.fail(&err);
        }

        self.set(CallbackState::Loading { attempt: 0 });

        let store = &self.store;
        let result = self
            .policy
            .run(
                move || store.refresh(),
                |retry, err, delay| {
                    info!(retry, kind = %err.kind(), delay_ms = delay.as_millis() as u64, "Retrying session fetch");
                    self.set(CallbackState::Loading { attempt: retry });
                },
            )
            .await;

        match result {
            Ok(Some(session)) => {
                let destination = self.router.post_login_destination(&session.principal);
                info!(destination, "Callback complete");
                self.set(CallbackState::Redirecting {
                    destination: destination.to_string(),
                })
            }
            Ok(None) => {
                warn!("Callback finished without a session");
                self.reporter
                    .event_bus()
                    .notify(Notice::warning("Link expired", EXPIRED_CODE_GUIDANCE));
                self.set(CallbackState::Redirecting {
                    destination: self.router.routes().login.clone(),
                })
            }
            Err(err) => {
                self.reporter.track("auth.callback", &err, None);
                self.fail(&err)
            }
        }
    }

    /// "Try Again": rerun the flow with a fresh retry budget.
    pub async fn retry(&self) -> CallbackState {
        self.complete(&CallbackParams::default()).await
    }

    /// "Return to Login".
    pub fn login_destination(&self) -> &str {
        &self.router.routes().login
    }

    fn fail(&self, err: &AuthError) -> CallbackState {
        let expired = matches!(err, AuthError::CodeExpired(_));
        let message = if expired {
            EXPIRED_CODE_GUIDANCE.to_string()
        } else {
            err.user_message()
        };
        self.set(CallbackState::Failed { message, expired })
    }

    fn set(&self, state: CallbackState) -> CallbackState {
        self.state.send_replace(state.clone());
        state
    }
}
