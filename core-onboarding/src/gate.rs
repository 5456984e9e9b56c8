use core_auth::AuthSnapshot;
use core_runtime::config::RouteSettings;

/// Decides when the onboarding wizard has to run.
///
/// A pure function of the snapshot's flags; the host mounts the wizard on
/// its home route while [`requires_onboarding`](Self::requires_onboarding)
/// holds.
#[derive(Debug, Clone, Default)]
pub struct OnboardingGate {
    routes: RouteSettings,
}

impl OnboardingGate {
    pub fn new(routes: RouteSettings) -> Self {
        Self { routes }
    }

    /// Authenticated, settled and not yet onboarded.
    pub fn requires_onboarding(&self, snapshot: &AuthSnapshot) -> bool {
        !snapshot.is_loading && snapshot.is_authenticated && !snapshot.has_completed_onboarding
    }

    /// Whether the wizard should be shown on `path`.
    pub fn should_mount_wizard(&self, snapshot: &AuthSnapshot, path: &str) -> bool {
        self.requires_onboarding(snapshot) && path == self.routes.home
    }

    /// Where the host goes once the wizard completes.
    pub fn after_completion(&self) -> &str {
        &self.routes.dashboard
    }
}
