//! # Authentication Module
//!
//! Session and credential orchestration on top of a host-provided
//! [`IdentityBackend`](bridge_traits::identity::IdentityBackend).
//!
//! ## Overview
//!
//! - [`SessionStore`]: the single owner of the current [`Session`], restored
//!   at startup and kept in sync with the backend's live change stream
//! - [`CredentialFlow`]: password sign-in, sign-up, one-time codes with
//!   network diagnostics and a cancellable deadline, reset and sign-out
//! - [`CallbackHandler`]: completes the emailed-link callback under a
//!   bounded [`RetryPolicy`]
//! - [`PasswordGate`]: forces a password onto principals that never set one
//! - [`RouteGuard`]: turns the two metadata gates into routing decisions
//!
//! Every failure is classified into [`AuthError`] and reported through one
//! [`FailureReporter`].

pub mod callback;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod password;
pub mod retry;
pub mod routing;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use callback::{CallbackHandler, CallbackParams, CallbackState};
pub use credentials::{CredentialFlow, SignUpOutcome};
pub use diagnostics::{classify, FailureReporter, NetworkDiagnostics};
pub use error::{AuthError, AuthErrorKind, Result, EXPIRED_CODE_GUIDANCE};
pub use password::{PasswordGate, PasswordRequirement, PasswordValidator};
pub use retry::RetryPolicy;
pub use routing::{RouteDecision, RouteGuard};
pub use session::{ListenerGuard, SessionStore};
pub use types::{
    AuthSnapshot, Principal, PrincipalId, PrincipalMetadata, Session, HAS_SET_PASSWORD,
    ONBOARDING_COMPLETED,
};
