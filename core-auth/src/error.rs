use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified failure of an auth operation.
///
/// Backend failures are mapped onto these variants by
/// [`classify`](crate::diagnostics::classify); the wrapped string is the
/// backend's own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Local input check failed; nothing was sent to the backend.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// No such account and sign-up on demand is disabled.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// The backend failed to look up the user; a server-side configuration symptom.
    #[error("Backend misconfigured: {0}")]
    BackendMisconfigured(String),

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The one-time code or link is expired or was already used.
    #[error("Code expired: {0}")]
    CodeExpired(String),

    #[error("Backend error: {0}")]
    BackendUnknown(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Platform bridge error: {0}")]
    Bridge(String),
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        AuthError::Bridge(err.to_string())
    }
}

/// Discriminant of [`AuthError`], used in events and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    Validation,
    InvalidCredentials,
    InvalidAccount,
    BackendMisconfigured,
    NetworkUnreachable,
    Timeout,
    RateLimited,
    CodeExpired,
    BackendUnknown,
    NotAuthenticated,
    Bridge,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::Validation => "validation",
            AuthErrorKind::InvalidCredentials => "invalid_credentials",
            AuthErrorKind::InvalidAccount => "invalid_account",
            AuthErrorKind::BackendMisconfigured => "backend_misconfigured",
            AuthErrorKind::NetworkUnreachable => "network_unreachable",
            AuthErrorKind::Timeout => "timeout",
            AuthErrorKind::RateLimited => "rate_limited",
            AuthErrorKind::CodeExpired => "code_expired",
            AuthErrorKind::BackendUnknown => "backend_unknown",
            AuthErrorKind::NotAuthenticated => "not_authenticated",
            AuthErrorKind::Bridge => "bridge",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guidance shown when a one-time code or link no longer works.
pub const EXPIRED_CODE_GUIDANCE: &str = "This sign-in link has expired or was already used. \
     Links are single-use and valid for 15 minutes. Request a new one from the login page.";

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Validation(_) => AuthErrorKind::Validation,
            AuthError::InvalidCredentials(_) => AuthErrorKind::InvalidCredentials,
            AuthError::InvalidAccount(_) => AuthErrorKind::InvalidAccount,
            AuthError::BackendMisconfigured(_) => AuthErrorKind::BackendMisconfigured,
            AuthError::NetworkUnreachable(_) => AuthErrorKind::NetworkUnreachable,
            AuthError::Timeout(_) => AuthErrorKind::Timeout,
            AuthError::RateLimited(_) => AuthErrorKind::RateLimited,
            AuthError::CodeExpired(_) => AuthErrorKind::CodeExpired,
            AuthError::BackendUnknown(_) => AuthErrorKind::BackendUnknown,
            AuthError::NotAuthenticated => AuthErrorKind::NotAuthenticated,
            AuthError::Bridge(_) => AuthErrorKind::Bridge,
        }
    }

    /// Network, timeout and expired-code failures may clear up on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkUnreachable(_) | AuthError::Timeout(_) | AuthError::CodeExpired(_)
        )
    }

    /// Short heading for a user-facing notice.
    pub fn title(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "Please check your input",
            AuthError::InvalidCredentials(_) => "Sign in failed",
            AuthError::InvalidAccount(_) => "Account not found",
            AuthError::BackendMisconfigured(_) => "Sign in is temporarily unavailable",
            AuthError::NetworkUnreachable(_) => "Can't reach the server",
            AuthError::Timeout(_) => "Request timed out",
            AuthError::RateLimited(_) => "Too many attempts",
            AuthError::CodeExpired(_) => "Link expired",
            AuthError::BackendUnknown(_) => "Something went wrong",
            AuthError::NotAuthenticated => "Please sign in",
            AuthError::Bridge(_) => "Something went wrong",
        }
    }

    /// Actionable guidance for the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(reason) => reason.clone(),
            AuthError::InvalidCredentials(_) => {
                "The email or password is incorrect. Check both and try again.".to_string()
            }
            AuthError::InvalidAccount(_) => {
                "No account exists for this email address. Contact your administrator \
                 or sign up first."
                    .to_string()
            }
            AuthError::BackendMisconfigured(_) => {
                "The authentication service could not look up your account. This is a \
                 server configuration problem, not something you did. Please try again \
                 later or contact support."
                    .to_string()
            }
            AuthError::NetworkUnreachable(_) => {
                "We couldn't reach the authentication service. Possible causes: no \
                 internet connection, a browser extension or ad blocker interfering, a \
                 firewall or VPN blocking the request, or a CORS/site URL misconfiguration \
                 on the server."
                    .to_string()
            }
            AuthError::Timeout(_) => {
                "The request took too long to complete. Check your connection and try again."
                    .to_string()
            }
            AuthError::RateLimited(_) => {
                "Too many requests were made. Please wait a minute before trying again."
                    .to_string()
            }
            AuthError::CodeExpired(_) => EXPIRED_CODE_GUIDANCE.to_string(),
            AuthError::BackendUnknown(message) => message.clone(),
            AuthError::NotAuthenticated => "Your session has ended. Please sign in again.".to_string(),
            AuthError::Bridge(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
