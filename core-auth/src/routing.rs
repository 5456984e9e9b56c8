//! Route decisions derived from the two metadata gates.
//!
//! The core never navigates; it hands the host router opaque destination
//! strings taken from [`RouteSettings`].

use core_runtime::config::RouteSettings;

use crate::types::{AuthSnapshot, Principal};

/// Outcome of guarding a requested destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session is still being restored; render nothing yet.
    Pending,
    Allow,
    Redirect {
        to: String,
        /// Where to send the user once the redirect target is satisfied.
        return_to: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteSettings,
}

impl RouteGuard {
    pub fn new(routes: RouteSettings) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteSettings {
        &self.routes
    }

    /// Where a freshly authenticated principal goes first.
    pub fn post_login_destination(&self, principal: &Principal) -> &str {
        if !principal.has_set_password() {
            &self.routes.set_password
        } else if !principal.has_completed_onboarding() {
            &self.routes.home
        } else {
            &self.routes.dashboard
        }
    }

    /// Destination after the password-adoption screen, honouring the
    /// originally requested page when onboarding no longer intercepts it.
    pub fn after_password_adoption(&self, principal: &Principal, return_to: Option<&str>) -> String {
        if !principal.has_completed_onboarding() {
            return self.routes.home.clone();
        }
        match return_to {
            Some(target) if !self.is_auth_route(target) => target.to_string(),
            _ => self.routes.dashboard.clone(),
        }
    }

    /// Decide whether `requested` may render for `snapshot`.
    pub fn evaluate(&self, snapshot: &AuthSnapshot, requested: &str) -> RouteDecision {
        if snapshot.is_loading {
            return RouteDecision::Pending;
        }

        let path = path_of(requested);
        if path == self.routes.login || path == self.routes.callback {
            return RouteDecision::Allow;
        }

        if !snapshot.is_authenticated {
            return RouteDecision::Redirect {
                to: self.routes.login.clone(),
                return_to: Some(requested.to_string()),
            };
        }

        if !snapshot.has_set_password {
            if path == self.routes.set_password {
                return RouteDecision::Allow;
            }
            return RouteDecision::Redirect {
                to: self.routes.set_password.clone(),
                return_to: Some(requested.to_string()),
            };
        }

        if !snapshot.has_completed_onboarding && path != self.routes.home {
            return RouteDecision::Redirect {
                to: self.routes.home.clone(),
                return_to: None,
            };
        }

        RouteDecision::Allow
    }

    fn is_auth_route(&self, target: &str) -> bool {
        let path = path_of(target);
        [
            &self.routes.login,
            &self.routes.callback,
            &self.routes.set_password,
        ]
        .iter()
        .any(|route| path == route.as_str())
    }
}

fn path_of(destination: &str) -> &str {
    destination
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::session;

    fn guard() -> RouteGuard {
        RouteGuard::default()
    }

    fn snapshot(has_set_password: bool, onboarding_completed: bool) -> AuthSnapshot {
        AuthSnapshot::resolved(Some(session(has_set_password, onboarding_completed)))
    }

    #[test]
    fn test_loading_is_pending() {
        assert_eq!(
            guard().evaluate(&AuthSnapshot::loading(), "/dashboard"),
            RouteDecision::Pending
        );
    }

    #[test]
    fn test_unauthenticated_goes_to_login() {
        assert_eq!(
            guard().evaluate(&AuthSnapshot::resolved(None), "/deals?page=2"),
            RouteDecision::Redirect {
                to: "/login".into(),
                return_to: Some("/deals?page=2".into()),
            }
        );
        assert_eq!(
            guard().evaluate(&AuthSnapshot::resolved(None), "/auth/callback#access_token=x"),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_password_gate_preserves_requested_destination() {
        let decision = guard().evaluate(&snapshot(false, true), "/deals/42");
        assert_eq!(
            decision,
            RouteDecision::Redirect {
                to: "/set-password".into(),
                return_to: Some("/deals/42".into()),
            }
        );
        assert_eq!(
            guard().evaluate(&snapshot(false, true), "/set-password"),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_onboarding_gate_sends_home() {
        assert_eq!(
            guard().evaluate(&snapshot(true, false), "/dashboard"),
            RouteDecision::Redirect {
                to: "/".into(),
                return_to: None,
            }
        );
        assert_eq!(guard().evaluate(&snapshot(true, false), "/"), RouteDecision::Allow);
        assert_eq!(
            guard().evaluate(&snapshot(true, true), "/dashboard"),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_post_login_destination() {
        let guard = guard();
        assert_eq!(
            guard.post_login_destination(&session(false, false).principal),
            "/set-password"
        );
        assert_eq!(guard.post_login_destination(&session(true, false).principal), "/");
        assert_eq!(
            guard.post_login_destination(&session(true, true).principal),
            "/dashboard"
        );
    }

    #[test]
    fn test_after_password_adoption() {
        let guard = guard();
        let done = session(true, true).principal;
        assert_eq!(guard.after_password_adoption(&done, Some("/deals/42")), "/deals/42");
        assert_eq!(guard.after_password_adoption(&done, Some("/login")), "/dashboard");
        assert_eq!(guard.after_password_adoption(&done, None), "/dashboard");

        let onboarding = session(true, false).principal;
        assert_eq!(guard.after_password_adoption(&onboarding, Some("/deals/42")), "/");
    }
}
