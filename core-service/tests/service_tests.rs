//! End-to-end tests for the core service façade

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_traits::error::BackendResult;
use bridge_traits::profile::{ProfileRow, ProfileStore};
use core_auth::testing::{
    flagged_session, FakeIdentity, MemoryKeyValueStore, RecordingTracker, StaticNetwork,
};
use core_auth::{AuthError, CallbackState, RouteDecision};
use core_onboarding::{LocationPermission, UserDataPatch, WizardStep};
use core_runtime::config::{AuthSettings, CoreConfig};
use core_service::{CoreError, CoreService};

#[derive(Default)]
struct MemoryProfiles {
    rows: Mutex<HashMap<String, ProfileRow>>,
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn select(&self, id: &str) -> BackendResult<Option<ProfileRow>> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn insert(&self, row: &ProfileRow) -> BackendResult<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update(&self, row: &ProfileRow, id: &str) -> BackendResult<()> {
        self.rows.lock().unwrap().insert(id.to_string(), row.clone());
        Ok(())
    }
}

struct Fixture {
    core: CoreService,
    identity: Arc<FakeIdentity>,
    kv: Arc<MemoryKeyValueStore>,
    profiles: Arc<MemoryProfiles>,
    tracker: Arc<RecordingTracker>,
}

fn fixture(identity: FakeIdentity, online: bool) -> Fixture {
    let identity = Arc::new(identity);
    let kv = Arc::new(MemoryKeyValueStore::new());
    let profiles = Arc::new(MemoryProfiles::default());
    let tracker = Arc::new(RecordingTracker::default());

    let config = CoreConfig::builder()
        .identity_backend(identity.clone())
        .profile_store(profiles.clone())
        .key_value_store(kv.clone())
        .network_monitor(Arc::new(StaticNetwork(online)))
        .error_tracker(tracker.clone())
        .auth_settings(AuthSettings::new("https://portal.example.com"))
        .build()
        .unwrap();

    Fixture {
        core: CoreService::new(config).unwrap(),
        identity,
        kv,
        profiles,
        tracker,
    }
}

#[tokio::test]
async fn test_first_login_walks_both_gates() {
    let f = fixture(FakeIdentity::with_session(flagged_session(false, false)), true);
    f.core.current_session().await.unwrap();

    assert_eq!(
        f.core.evaluate_route("/deals/42"),
        RouteDecision::Redirect {
            to: "/set-password".into(),
            return_to: Some("/deals/42".into()),
        }
    );

    let destination = f
        .core
        .update_user_password("Practice2024", Some("/deals/42"))
        .await
        .unwrap();
    assert_eq!(destination, "/");
    assert!(f.core.has_set_password());
    assert!(f.core.requires_onboarding());
    assert_eq!(
        f.core.evaluate_route("/deals/42"),
        RouteDecision::Redirect {
            to: "/".into(),
            return_to: None,
        }
    );

    let draft = f.core.open_onboarding().await.unwrap();
    assert_eq!(draft.step, WizardStep::Basics);
    assert!(f.core.is_onboarding_email_locked().await.unwrap());

    f.core
        .update_onboarding_data(UserDataPatch {
            full_name: Some("Dr. Sam Lee".into()),
            specialty: Some("Orthodontics".into()),
            location_permission: Some(LocationPermission::Declined),
            ..Default::default()
        })
        .await
        .unwrap();
    f.core.onboarding_next().await.unwrap();
    f.core.onboarding_next().await.unwrap();
    f.core.onboarding_skip().await.unwrap();
    f.core.onboarding_skip().await.unwrap();
    assert_eq!(f.core.onboarding_next().await.unwrap(), WizardStep::Review);

    let destination = f.core.complete_onboarding().await.unwrap();

    assert_eq!(destination, "/dashboard");
    let snapshot = f.core.snapshot();
    assert!(snapshot.has_set_password);
    assert!(snapshot.has_completed_onboarding);
    assert!(!f.core.requires_onboarding());
    assert_eq!(f.core.evaluate_route("/deals/42"), RouteDecision::Allow);
    assert_eq!(f.profiles.rows.lock().unwrap().len(), 1);
    assert!(f.kv.get("onboarding_progress").is_none());
    assert!(f.core.onboarding_draft().await.is_none());
}

#[tokio::test]
async fn test_wizard_operations_need_an_open_wizard() {
    let f = fixture(FakeIdentity::with_session(flagged_session(true, false)), true);

    assert!(matches!(
        f.core.onboarding_next().await,
        Err(CoreError::WizardNotOpen)
    ));
}

#[tokio::test]
async fn test_onboarding_requires_a_session() {
    let f = fixture(FakeIdentity::new(), true);

    assert!(matches!(
        f.core.open_onboarding().await,
        Err(CoreError::Auth(AuthError::NotAuthenticated))
    ));
}

#[tokio::test]
async fn test_offline_one_time_code_fails_fast() {
    let f = fixture(FakeIdentity::new(), false);

    let err = f
        .core
        .request_one_time_code("dr.lee@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Auth(AuthError::NetworkUnreachable(_))));
    assert!(f.identity.one_time_code_requests().is_empty());
    assert_eq!(f.tracker.origins(), vec!["auth.one_time_code".to_string()]);
}

#[tokio::test]
async fn test_expired_callback_link_fails_without_fetch() {
    let f = fixture(FakeIdentity::new(), true);
    f.core.current_session().await;
    let calls_before = f.identity.get_session_calls();

    let state = f
        .core
        .complete_callback(
            "https://portal.example.com/auth/callback#error=access_denied&error_code=otp_expired",
        )
        .await;

    assert!(matches!(state, CallbackState::Failed { expired: true, .. }));
    assert_eq!(f.identity.get_session_calls(), calls_before);
    assert_eq!(f.core.login_destination(), "/login");
}

#[tokio::test]
async fn test_sign_out_closes_wizard_and_keeps_draft() {
    let f = fixture(FakeIdentity::with_session(flagged_session(true, false)), true);
    f.core.open_onboarding().await.unwrap();
    f.core
        .update_onboarding_data(UserDataPatch {
            full_name: Some("Dr. Sam Lee".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    f.core.sign_out().await.unwrap();

    assert!(!f.core.snapshot().is_authenticated);
    assert!(f.core.onboarding_draft().await.is_none());
    assert!(f.kv.get("onboarding_data").is_some());
    assert_eq!(f.identity.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_builder_starts_session_store() {
    let identity = Arc::new(FakeIdentity::new());
    let config = CoreConfig::builder()
        .identity_backend(identity)
        .profile_store(Arc::new(MemoryProfiles::default()))
        .key_value_store(Arc::new(MemoryKeyValueStore::new()))
        .network_monitor(Arc::new(StaticNetwork(true)))
        .build()
        .unwrap();

    let core = CoreService::builder(config).build().unwrap();
    assert!(core.current_session().await.is_none());
}
