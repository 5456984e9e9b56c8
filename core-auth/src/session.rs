//! # Session Store
//!
//! Single source of truth for "who is signed in".
//!
//! ## Overview
//!
//! On [`SessionStore::start`] the store does two things concurrently:
//!
//! - asks the identity backend for any persisted session (the *restore*)
//! - subscribes, exactly once, to the backend's session-change stream
//!
//! Whichever settles first ends the loading phase. A live change event that
//! arrives before the restore completes wins; the late restore result is
//! discarded rather than overwriting newer state.
//!
//! The current [`AuthSnapshot`] is published on a `watch` channel so the UI
//! can render from it, and every applied change is fanned out to registered
//! listeners and to the event bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use bridge_traits::identity::{BackendUser, IdentityBackend, SessionChangeKind};
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::watch;
use core_async::task::BackgroundTask;
use core_runtime::events::{AuthEvent, CoreEvent};
use tracing::{debug, info, instrument, warn};

use crate::diagnostics::{classify, FailureReporter};
use crate::error::{AuthError, Result};
use crate::types::{AuthSnapshot, Principal, PrincipalId, Session};

type Listener = Arc<dyn Fn(SessionChangeKind, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct ListenerState {
    /// Set once any live change event has been applied.
    live_event_seen: bool,
    next_listener_id: u64,
    listeners: Vec<(u64, Listener)>,
    /// Highest flag values ever observed per principal; survives sign-out.
    flag_marks: HashMap<PrincipalId, FlagMark>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FlagMark {
    has_set_password: bool,
    onboarding_completed: bool,
}

struct Inner {
    backend: Arc<dyn IdentityBackend>,
    reporter: FailureReporter,
    clock: Arc<dyn Clock>,
    snapshot: watch::Sender<AuthSnapshot>,
    state: Mutex<ListenerState>,
}

/// Where an applied change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Restore,
    Live,
    Local,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn restore(&self) {
        let restored = match self.backend.get_session().await {
            Ok(session) => session.map(Session::try_from).transpose(),
            Err(err) => Err(classify(&err)),
        };

        let session = restored.unwrap_or_else(|err| {
            self.reporter.track("session.restore", &err, None);
            None
        });

        self.apply(SessionChangeKind::InitialSession, session, Origin::Restore);
    }

    async fn listen(&self) {
        let mut stream = match self.backend.subscribe_session_changes().await {
            Ok(stream) => stream,
            Err(err) => {
                self.reporter
                    .track("session.subscribe", &classify(&err), None);
                return;
            }
        };

        while let Some(change) = stream.next().await {
            let session = match change.kind {
                SessionChangeKind::SignedOut => None,
                _ => match change.session.map(Session::try_from).transpose() {
                    Ok(session) => session,
                    Err(err) => {
                        self.reporter.track("session.change", &err, None);
                        continue;
                    }
                },
            };
            self.apply(change.kind, session, Origin::Live);
        }

        debug!("Session change stream closed");
    }

    /// Replace the current session and notify everyone.
    ///
    /// Returns the session now held; a restore that lost the race against a
    /// live event is dropped and returns `None`.
    fn apply(
        &self,
        kind: SessionChangeKind,
        incoming: Option<Session>,
        origin: Origin,
    ) -> Option<Session> {
        let (listeners, previous, current) = {
            let mut state = self.lock();
            match origin {
                Origin::Restore if state.live_event_seen => {
                    debug!("Live session event already applied; discarding restore result");
                    return None;
                }
                Origin::Live => state.live_event_seen = true,
                _ => {}
            }

            let previous = self.snapshot.borrow().session.clone();
            let now = self.clock.now();
            let current = incoming
                .filter(|session| {
                    let expired = session.is_expired(now);
                    if expired {
                        debug!(principal = %session.principal.id, "Discarding expired session");
                    }
                    !expired
                })
                .map(|mut session| {
                    let mark = state.flag_marks.entry(session.principal.id).or_default();
                    let metadata = &mut session.principal.metadata;
                    metadata.raise_flags(mark.has_set_password, mark.onboarding_completed);
                    mark.has_set_password = metadata.has_set_password;
                    mark.onboarding_completed = metadata.onboarding_completed;
                    session
                });

            self.snapshot
                .send_replace(AuthSnapshot::resolved(current.clone()));

            let listeners: Vec<Listener> =
                state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (listeners, previous, current)
        };

        debug!(?kind, ?origin, authenticated = current.is_some(), "Session applied");
        self.publish(kind, previous.as_ref(), current.as_ref());

        for listener in listeners {
            listener(kind, current.as_ref());
        }
        current
    }

    fn publish(&self, kind: SessionChangeKind, previous: Option<&Session>, current: Option<&Session>) {
        let principal_id = |s: &Session| s.principal.id.to_string();
        let event = match (kind, previous, current) {
            (SessionChangeKind::InitialSession, _, current) => AuthEvent::SessionRestored {
                principal_id: current.map(principal_id),
            },
            (_, None, None) => return,
            (_, Some(prev), None) => AuthEvent::SignedOut {
                principal_id: Some(principal_id(prev)),
            },
            (_, Some(prev), Some(cur)) if prev.principal.id == cur.principal.id => {
                AuthEvent::SessionRefreshed {
                    principal_id: principal_id(cur),
                    expires_at: cur.expires_at.map(|t| t.timestamp()),
                }
            }
            (_, _, Some(cur)) => {
                info!(principal = %cur.principal.id, "Signed in");
                AuthEvent::SignedIn {
                    principal_id: principal_id(cur),
                }
            }
        };
        let _ = self.reporter.event_bus().emit(CoreEvent::Auth(event));
    }
}

/// Unregisters its listener when dropped.
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct ListenerGuard {
    inner: Weak<Inner>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Holds the current session and keeps it in sync with the backend.
pub struct SessionStore {
    inner: Arc<Inner>,
    worker: BackgroundTask,
}

impl SessionStore {
    /// Start restoring and listening.
    ///
    /// Must be called from within a Tokio runtime; the restore and the
    /// change subscription run on a spawned task until [`shutdown`] or drop.
    ///
    /// [`shutdown`]: SessionStore::shutdown
    pub fn start(backend: Arc<dyn IdentityBackend>, reporter: FailureReporter) -> Self {
        Self::start_with_clock(backend, reporter, Arc::new(SystemClock))
    }

    /// Like [`start`](SessionStore::start), judging session expiry by `clock`.
    pub fn start_with_clock(
        backend: Arc<dyn IdentityBackend>,
        reporter: FailureReporter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (snapshot, _) = watch::channel(AuthSnapshot::loading());
        let inner = Arc::new(Inner {
            backend,
            reporter,
            clock,
            snapshot,
            state: Mutex::new(ListenerState::default()),
        });

        let state = Arc::clone(&inner);
        let worker = BackgroundTask::spawn(async move {
            core_async::join!(state.restore(), state.listen());
        });

        Self { inner, worker }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.snapshot.borrow().is_loading
    }

    /// The current session, waiting for the loading phase to end first.
    ///
    /// A session that has expired since it was applied is dropped here.
    pub async fn current_session(&self) -> Option<Session> {
        let mut rx = self.inner.snapshot.subscribe();
        let session = match rx.wait_for(|snapshot| !snapshot.is_loading).await {
            Ok(snapshot) => snapshot.session.clone(),
            Err(_) => None,
        };

        match session {
            Some(session) if session.is_expired(self.inner.clock.now()) => {
                info!(principal = %session.principal.id, "Session expired");
                self.inner
                    .apply(SessionChangeKind::SignedOut, None, Origin::Local);
                None
            }
            session => session,
        }
    }

    pub fn current_principal_id(&self) -> Option<PrincipalId> {
        self.inner
            .snapshot
            .borrow()
            .principal()
            .map(|principal| principal.id)
    }

    /// Register a callback invoked after every applied change.
    pub fn on_session_change<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(SessionChangeKind, Option<&Session>) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((id, Arc::new(listener)));

        ListenerGuard {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Re-read the session from the backend and apply it.
    ///
    /// Failures are returned to the caller untracked; the caller decides
    /// whether the failure is worth reporting (the callback handler retries).
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Option<Session>> {
        let session = self
            .inner
            .backend
            .get_session()
            .await
            .map_err(|err| classify(&err))?
            .map(Session::try_from)
            .transpose()?;

        let kind = if session.is_some() {
            SessionChangeKind::TokenRefreshed
        } else {
            SessionChangeKind::SignedOut
        };
        Ok(self.inner.apply(kind, session, Origin::Local))
    }

    /// Apply a session obtained by a local flow (sign-in, sign-up).
    ///
    /// Returns the session as held by the store, with previously observed
    /// flags merged in.
    pub(crate) fn apply_session(&self, session: Session) -> Option<Session> {
        self.inner
            .apply(SessionChangeKind::SignedIn, Some(session), Origin::Local)
    }

    /// Replace the principal of the current session with a user returned by
    /// a backend write (password or metadata update).
    pub fn apply_user(&self, user: BackendUser) -> Result<()> {
        let Some(mut session) = self.snapshot().session else {
            return Err(AuthError::NotAuthenticated);
        };
        let principal = Principal::try_from(user)?;
        if principal.id != session.principal.id {
            warn!(
                current = %session.principal.id,
                updated = %principal.id,
                "Ignoring user update for a different principal"
            );
            return Ok(());
        }

        session.principal = principal;
        self.inner
            .apply(SessionChangeKind::UserUpdated, Some(session), Origin::Local);
        Ok(())
    }

    /// Drop the local session without contacting the backend.
    pub(crate) fn clear(&self) {
        self.inner
            .apply(SessionChangeKind::SignedOut, None, Origin::Local);
    }

    /// Stop the restore/listener task. Idempotent.
    pub fn shutdown(&self) {
        if self.worker.stop() {
            debug!("Session store stopped");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
