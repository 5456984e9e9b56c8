//! In-memory collaborators for tests.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature,
//! for downstream crates that need a scriptable identity backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bridge_traits::error::{BackendError, BackendResult, BridgeError, Result as BridgeResult};
use bridge_traits::identity::{
    BackendSession, BackendUser, IdentityBackend, OneTimeCodeOptions, SessionChange,
    SessionChangeKind, SessionChangeStream, SignUpResult, UserUpdate,
};
use bridge_traits::network::{NetworkInfo, NetworkMonitor};
use bridge_traits::storage::KeyValueStore;
use bridge_traits::telemetry::{ErrorReport, ErrorTracker};
use chrono::Utc;
use core_async::cancel::CancellationToken;
use core_async::sync::mpsc;
use core_async::time::{sleep, Duration};
use core_runtime::events::EventBus;
use serde_json::{json, Map, Value};

use crate::diagnostics::FailureReporter;
use crate::types::Session;

pub const PRINCIPAL: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
pub const EMAIL: &str = "dr.lee@example.com";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn backend_user(metadata: Value) -> BackendUser {
    BackendUser {
        id: PRINCIPAL.to_string(),
        email: Some(EMAIL.to_string()),
        email_confirmed_at: Some(Utc::now()),
        user_metadata: metadata.as_object().cloned().unwrap_or_default(),
    }
}

pub fn backend_session(metadata: Value) -> BackendSession {
    BackendSession {
        access_token: "access".to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_at: None,
        user: backend_user(metadata),
    }
}

pub fn flagged_session(has_set_password: bool, onboarding_completed: bool) -> BackendSession {
    backend_session(json!({
        "has_set_password": has_set_password,
        "onboarding_completed": onboarding_completed,
    }))
}

pub fn session(has_set_password: bool, onboarding_completed: bool) -> Session {
    match Session::try_from(flagged_session(has_set_password, onboarding_completed)) {
        Ok(session) => session,
        Err(err) => panic!("fixture session is invalid: {err}"),
    }
}

/// Scriptable identity backend.
///
/// `get_session` pops scripted results first and falls back to the current
/// session. Live changes are pushed with [`FakeIdentity::emit`].
pub struct FakeIdentity {
    session: Mutex<Option<BackendSession>>,
    session_results: Mutex<VecDeque<BackendResult<Option<BackendSession>>>>,
    restore_delay: Mutex<Option<Duration>>,
    session_calls: AtomicUsize,
    changes_tx: mpsc::UnboundedSender<SessionChange>,
    changes_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionChange>>>,
    subscriptions: AtomicUsize,
    sign_in_error: Mutex<Option<BackendError>>,
    sign_up_result: Mutex<Option<BackendResult<SignUpResult>>>,
    sign_up_calls: AtomicUsize,
    otp_error: Mutex<Option<BackendError>>,
    otp_delay: Mutex<Option<Duration>>,
    otp_requests: Mutex<Vec<(String, OneTimeCodeOptions)>>,
    otp_token: Mutex<Option<CancellationToken>>,
    update_error: Mutex<Option<BackendError>>,
    updates: Mutex<Vec<UserUpdate>>,
    sign_out_error: Mutex<Option<BackendError>>,
    sign_out_calls: AtomicUsize,
    reset_requests: Mutex<Vec<(String, String)>>,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            session: Mutex::new(None),
            session_results: Mutex::new(VecDeque::new()),
            restore_delay: Mutex::new(None),
            session_calls: AtomicUsize::new(0),
            changes_tx,
            changes_rx: Mutex::new(Some(changes_rx)),
            subscriptions: AtomicUsize::new(0),
            sign_in_error: Mutex::new(None),
            sign_up_result: Mutex::new(None),
            sign_up_calls: AtomicUsize::new(0),
            otp_error: Mutex::new(None),
            otp_delay: Mutex::new(None),
            otp_requests: Mutex::new(Vec::new()),
            otp_token: Mutex::new(None),
            update_error: Mutex::new(None),
            updates: Mutex::new(Vec::new()),
            sign_out_error: Mutex::new(None),
            sign_out_calls: AtomicUsize::new(0),
            reset_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: BackendSession) -> Self {
        let fake = Self::default();
        fake.set_session(Some(session));
        fake
    }

    pub fn set_session(&self, session: Option<BackendSession>) {
        *lock(&self.session) = session;
    }

    /// Queue a result for the next `get_session` call.
    pub fn push_session_result(&self, result: BackendResult<Option<BackendSession>>) {
        lock(&self.session_results).push_back(result);
    }

    pub fn get_session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn delay_restore(&self, delay: Duration) {
        *lock(&self.restore_delay) = Some(delay);
    }

    /// Deliver a live change to the subscriber.
    pub fn emit(&self, kind: SessionChangeKind, session: Option<BackendSession>) {
        let _ = self.changes_tx.send(SessionChange { kind, session });
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn fail_sign_in(&self, err: BackendError) {
        *lock(&self.sign_in_error) = Some(err);
    }

    pub fn set_sign_up_result(&self, result: BackendResult<SignUpResult>) {
        *lock(&self.sign_up_result) = Some(result);
    }

    pub fn sign_up_calls(&self) -> usize {
        self.sign_up_calls.load(Ordering::SeqCst)
    }

    pub fn fail_one_time_code(&self, err: BackendError) {
        *lock(&self.otp_error) = Some(err);
    }

    pub fn delay_one_time_code(&self, delay: Duration) {
        *lock(&self.otp_delay) = Some(delay);
    }

    pub fn one_time_code_requests(&self) -> Vec<(String, OneTimeCodeOptions)> {
        lock(&self.otp_requests).clone()
    }

    /// Token handed to the most recent one-time-code request.
    pub fn last_cancel_token(&self) -> Option<CancellationToken> {
        lock(&self.otp_token).clone()
    }

    pub fn fail_update_user(&self, err: BackendError) {
        *lock(&self.update_error) = Some(err);
    }

    pub fn updates(&self) -> Vec<UserUpdate> {
        lock(&self.updates).clone()
    }

    pub fn fail_sign_out(&self, err: BackendError) {
        *lock(&self.sign_out_error) = Some(err);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn reset_requests(&self) -> Vec<(String, String)> {
        lock(&self.reset_requests).clone()
    }

    /// Metadata currently stored for the signed-in user.
    pub fn user_metadata(&self) -> Map<String, Value> {
        lock(&self.session)
            .as_ref()
            .map(|session| session.user.user_metadata.clone())
            .unwrap_or_default()
    }
}

struct ChannelStream(mpsc::UnboundedReceiver<SessionChange>);

#[async_trait]
impl SessionChangeStream for ChannelStream {
    async fn next(&mut self) -> Option<SessionChange> {
        self.0.recv().await
    }
}

#[async_trait]
impl IdentityBackend for FakeIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> BackendResult<BackendSession> {
        if let Some(err) = lock(&self.sign_in_error).clone() {
            return Err(err);
        }
        let mut session = flagged_session(true, true);
        session.user.email = Some(email.to_string());
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: Map<String, Value>,
    ) -> BackendResult<SignUpResult> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = lock(&self.sign_up_result).take() {
            return result;
        }
        let mut session = backend_session(Value::Object(metadata));
        session.user.email = Some(email.to_string());
        self.set_session(Some(session.clone()));
        Ok(SignUpResult {
            user: Some(session.user.clone()),
            session: Some(session),
        })
    }

    async fn sign_in_with_one_time_code(
        &self,
        email: &str,
        options: &OneTimeCodeOptions,
        cancel: CancellationToken,
    ) -> BackendResult<()> {
        lock(&self.otp_requests).push((email.to_string(), options.clone()));
        *lock(&self.otp_token) = Some(cancel);

        let delay = *lock(&self.otp_delay);
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        match lock(&self.otp_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_session(&self) -> BackendResult<Option<BackendSession>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let delay = lock(&self.restore_delay).take();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let scripted = lock(&self.session_results).pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(lock(&self.session).clone()),
        }
    }

    async fn subscribe_session_changes(&self) -> BackendResult<Box<dyn SessionChangeStream>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        match lock(&self.changes_rx).take() {
            Some(rx) => Ok(Box::new(ChannelStream(rx))),
            None => Err(BackendError::new("FakeIdentity supports a single subscription")),
        }
    }

    async fn update_user(&self, update: UserUpdate) -> BackendResult<BackendUser> {
        lock(&self.updates).push(update.clone());
        if let Some(err) = lock(&self.update_error).clone() {
            return Err(err);
        }

        let mut current = lock(&self.session);
        let Some(session) = current.as_mut() else {
            return Err(BackendError::new("Auth session missing!").with_status(401));
        };
        if let Some(metadata) = update.metadata {
            session.user.user_metadata.extend(metadata);
        }
        Ok(session.user.clone())
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.sign_out_error).clone() {
            return Err(err);
        }
        self.set_session(None);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_url: &str) -> BackendResult<()> {
        lock(&self.reset_requests).push((email.to_string(), redirect_url.to_string()));
        Ok(())
    }
}

/// `HashMap`-like store standing in for browser local storage.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later `set_string` fail, like a full browser quota.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("storage quota exceeded".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BridgeResult<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.keys())
    }
}

/// Network monitor reporting a fixed online flag.
pub struct StaticNetwork(pub bool);

#[async_trait]
impl NetworkMonitor for StaticNetwork {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(NetworkInfo::from_online_flag(self.0))
    }
}

/// Error tracker that keeps every report.
#[derive(Default)]
pub struct RecordingTracker {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingTracker {
    pub fn reports(&self) -> Vec<ErrorReport> {
        lock(&self.reports).clone()
    }

    pub fn origins(&self) -> Vec<String> {
        self.reports().into_iter().map(|r| r.origin).collect()
    }
}

impl ErrorTracker for RecordingTracker {
    fn track_error(&self, report: ErrorReport) {
        lock(&self.reports).push(report);
    }
}

/// Reporter wired to `tracker` and a fresh event bus.
pub fn reporter(tracker: Arc<RecordingTracker>) -> FailureReporter {
    FailureReporter::new(tracker, EventBus::new(64))
}
