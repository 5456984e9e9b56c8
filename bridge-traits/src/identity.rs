//! Identity backend interface.
//!
//! The core never talks to the identity provider directly; it consumes this
//! trait. An adapter wraps the provider's HTTP/JSON client (email +
//! one-time-code + session-token protocol) and translates its responses into
//! the neutral types below.
//!
//! Metadata is carried as a raw JSON object here. Typed flags
//! (`has_set_password`, `onboarding_completed`) are parsed by `core-auth`.

use chrono::{DateTime, Utc};
use core_async::cancel::CancellationToken;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::BackendResult;

/// A user as reported by the identity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendUser {
    pub id: String,
    pub email: Option<String>,
    /// When the email address was confirmed, if ever.
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

/// A live session as reported by the identity backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: BackendUser,
}

impl fmt::Debug for BackendSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What kind of transition the backend observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionChangeKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One session transition delivered by the live listener.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub kind: SessionChangeKind,
    pub session: Option<BackendSession>,
}

/// Options for a passwordless one-time-code request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeCodeOptions {
    /// Create the account if the email is unknown.
    pub create_if_missing: bool,
    /// Where the emailed link sends the user back to.
    pub redirect_url: String,
}

/// Result of a sign-up call.
///
/// `session` is `None` when the backend requires email confirmation first.
#[derive(Debug, Clone)]
pub struct SignUpResult {
    pub user: Option<BackendUser>,
    pub session: Option<BackendSession>,
}

/// Changes to apply to the authenticated user in a single backend call.
#[derive(Clone, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    /// Keys merged into the user's metadata object.
    pub metadata: Option<Map<String, Value>>,
}

impl fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserUpdate")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Identity backend.
///
/// All methods surface backend failures as [`BackendError`](crate::error::BackendError)
/// carrying the backend's message verbatim.
#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> BackendResult<BackendSession>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> BackendResult<SignUpResult>;

    /// Email a one-time code / magic link.
    ///
    /// Implementations should abort the underlying request when `cancel`
    /// fires; the caller ignores any result produced after that point.
    async fn sign_in_with_one_time_code(
        &self,
        email: &str,
        options: &OneTimeCodeOptions,
        cancel: CancellationToken,
    ) -> BackendResult<()>;

    /// Restore the current session (from persisted token or a completed
    /// callback exchange). `Ok(None)` means nobody is signed in.
    async fn get_session(&self) -> BackendResult<Option<BackendSession>>;

    /// Open a live subscription to session transitions. Dropping the
    /// returned stream unsubscribes.
    async fn subscribe_session_changes(&self) -> BackendResult<Box<dyn SessionChangeStream>>;

    async fn update_user(&self, update: UserUpdate) -> BackendResult<BackendUser>;

    async fn sign_out(&self) -> BackendResult<()>;

    async fn reset_password_for_email(&self, email: &str, redirect_url: &str)
        -> BackendResult<()>;
}

/// Stream of session transitions, in the order the backend emits them.
#[async_trait::async_trait]
pub trait SessionChangeStream: Send {
    /// Next transition; `None` once the backend closes the subscription.
    async fn next(&mut self) -> Option<SessionChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> BackendUser {
        BackendUser {
            id: "3f2504e0-4f89-11d3-9a0c-0305e82c3301".to_string(),
            email: Some("dr.lee@example.com".to_string()),
            email_confirmed_at: None,
            user_metadata: Map::new(),
        }
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = BackendSession {
            access_token: "secret_access".to_string(),
            refresh_token: Some("secret_refresh".to_string()),
            expires_at: None,
            user: user(),
        };
        let debug = format!("{:?}", session);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret_access"));
        assert!(!debug.contains("secret_refresh"));
    }

    #[test]
    fn test_user_update_debug_redacts_password() {
        let update = UserUpdate {
            password: Some("Hunter22".to_string()),
            metadata: None,
        };
        let debug = format!("{:?}", update);
        assert!(!debug.contains("Hunter22"));
    }

    #[test]
    fn test_user_metadata_defaults_when_missing() {
        let json = r#"{"id":"abc","email":null,"email_confirmed_at":null}"#;
        let user: BackendUser = serde_json::from_str(json).unwrap();
        assert!(user.user_metadata.is_empty());
    }
}
