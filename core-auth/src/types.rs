use bridge_traits::identity::{BackendSession, BackendUser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// Metadata key recording that the principal has set a password.
pub const HAS_SET_PASSWORD: &str = "has_set_password";
/// Metadata key recording that onboarding finished.
pub const ONBOARDING_COMPLETED: &str = "onboarding_completed";

/// Identifier of an authenticated principal.
///
/// Identical to the profile row key, so the same value addresses both the
/// identity backend and the profile store.
///
/// # Examples
///
/// ```
/// use core_auth::PrincipalId;
///
/// let id = PrincipalId::from_string("550e8400-e29b-41d4-a716-446655440000").unwrap();
/// assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Typed view over the principal's metadata bag.
///
/// The two gating flags are explicit fields; everything else the backend
/// stores is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrincipalMetadata {
    pub has_set_password: bool,
    pub onboarding_completed: bool,
    pub extra: Map<String, Value>,
}

impl PrincipalMetadata {
    /// Parse the raw metadata object.
    ///
    /// Flags written by older clients as `"true"` strings count as set.
    pub fn from_map(mut raw: Map<String, Value>) -> Self {
        let has_set_password = raw.remove(HAS_SET_PASSWORD).map_or(false, |v| flag(&v));
        let onboarding_completed = raw
            .remove(ONBOARDING_COMPLETED)
            .map_or(false, |v| flag(&v));

        Self {
            has_set_password,
            onboarding_completed,
            extra: raw,
        }
    }

    /// Keep flags that were already observed as set; they never revert.
    pub(crate) fn raise_flags(&mut self, has_set_password: bool, onboarding_completed: bool) {
        self.has_set_password |= has_set_password;
        self.onboarding_completed |= onboarding_completed;
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// The authenticated identity and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: Option<String>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub metadata: PrincipalMetadata,
}

impl Principal {
    pub fn has_set_password(&self) -> bool {
        self.metadata.has_set_password
    }

    pub fn has_completed_onboarding(&self) -> bool {
        self.metadata.onboarding_completed
    }

    /// Email, but only once the backend has confirmed it.
    pub fn verified_email(&self) -> Option<&str> {
        self.email_confirmed_at.and(self.email.as_deref())
    }

    /// Best-effort display name from metadata (`full_name`, then `name`).
    pub fn display_name(&self) -> Option<&str> {
        ["full_name", "name"]
            .iter()
            .filter_map(|key| self.metadata.extra.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

impl TryFrom<BackendUser> for Principal {
    type Error = AuthError;

    fn try_from(user: BackendUser) -> Result<Self> {
        let id = PrincipalId::from_string(&user.id).map_err(|e| {
            AuthError::BackendUnknown(format!("Malformed principal id '{}': {}", user.id, e))
        })?;

        Ok(Self {
            id,
            email: user.email,
            email_confirmed_at: user.email_confirmed_at,
            metadata: PrincipalMetadata::from_map(user.user_metadata),
        })
    }
}

/// A live, time-bounded authorization owned by the session store.
#[derive(Clone, PartialEq)]
pub struct Session {
    access_token: String,
    refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub principal: Principal,
}

impl Session {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("principal", &self.principal)
            .finish()
    }
}

impl TryFrom<BackendSession> for Session {
    type Error = AuthError;

    fn try_from(session: BackendSession) -> Result<Self> {
        Ok(Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            principal: Principal::try_from(session.user)?,
        })
    }
}

/// What the UI renders from: the current session plus its derived flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    /// `true` until the startup restore (or the first live event) settles.
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub has_set_password: bool,
    pub has_completed_onboarding: bool,
}

impl AuthSnapshot {
    pub fn loading() -> Self {
        Self {
            session: None,
            is_loading: true,
            is_authenticated: false,
            has_set_password: false,
            has_completed_onboarding: false,
        }
    }

    pub fn resolved(session: Option<Session>) -> Self {
        let principal = session.as_ref().map(|s| &s.principal);
        Self {
            is_loading: false,
            is_authenticated: principal.is_some(),
            has_set_password: principal.map_or(false, Principal::has_set_password),
            has_completed_onboarding: principal.map_or(false, Principal::has_completed_onboarding),
            session,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|s| &s.principal)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{backend_user, session};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_flags_parse() {
        let meta = PrincipalMetadata::from_map(
            json!({"has_set_password": true, "onboarding_completed": "true", "specialty": "Ortho"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(meta.has_set_password);
        assert!(meta.onboarding_completed);
        assert_eq!(meta.extra.get("specialty"), Some(&json!("Ortho")));
        assert!(!meta.extra.contains_key(HAS_SET_PASSWORD));
    }

    #[test]
    fn test_missing_flags_default_false() {
        let meta = PrincipalMetadata::from_map(Map::new());
        assert!(!meta.has_set_password);
        assert!(!meta.onboarding_completed);
    }

    #[test]
    fn test_malformed_principal_id_rejected() {
        let mut user = backend_user(json!({}));
        user.id = "not-a-uuid".to_string();
        assert!(matches!(
            Principal::try_from(user),
            Err(AuthError::BackendUnknown(_))
        ));
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let debug = format!("{:?}", session(true, false));
        assert!(!debug.contains("access\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_snapshot_derivation() {
        let snapshot = AuthSnapshot::resolved(Some(session(true, false)));
        assert!(!snapshot.is_loading);
        assert!(snapshot.is_authenticated);
        assert!(snapshot.has_set_password);
        assert!(!snapshot.has_completed_onboarding);

        let signed_out = AuthSnapshot::resolved(None);
        assert!(!signed_out.is_authenticated);
        assert!(!signed_out.has_set_password);
        assert!(AuthSnapshot::loading().is_loading);
    }

    #[test]
    fn test_verified_email_requires_confirmation() {
        let mut principal = session(false, false).principal;
        assert_eq!(principal.verified_email(), Some("dr.lee@example.com"));
        principal.email_confirmed_at = None;
        assert_eq!(principal.verified_email(), None);
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let user = backend_user(json!({"name": "Lee", "full_name": "Dr. Sam Lee"}));
        let principal = Principal::try_from(user).unwrap();
        assert_eq!(principal.display_name(), Some("Dr. Sam Lee"));
    }
}
