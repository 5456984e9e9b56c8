//! # Event Bus System
//!
//! Broadcasts typed events from the auth and onboarding components to any
//! number of UI-side subscribers using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The core never renders anything. Everything a host needs to show
//! (a toast after a one-time code is sent, the inline guidance for a failed
//! sign-in, the wizard's current step) is published here and interpreted by
//! the host's view layer.
//!
//! ```text
//! ┌───────────────────┐   emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ Session Store     ├─────────>│           ├────────────>│ Route guard  │
//! ├───────────────────┤          │ EventBus  │             ├──────────────┤
//! │ Credential Flow   ├─────────>│ (broadcast├────────────>│ Toasts /     │
//! ├───────────────────┤          │  channel) │             │ inline notes │
//! │ Onboarding Wizard ├─────────>│           ├────────────>│ Wizard view  │
//! └───────────────────┘          └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedIn {
//!         principal_id: "3f2504e0-4f89-11d3-9a0c-0305e82c3301".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(matches!(stream.recv().await, Ok(CoreEvent::Auth(_))));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Authentication Events
//! - `SessionRestored`: Startup restore settled (with or without a session)
//! - `SignedIn` / `SignedOut` / `SessionRefreshed`: Live session transitions
//! - `OneTimeCodeSent`: Passwordless code/link dispatched
//! - `PasswordAdopted`: The principal set their first password
//! - `AuthError`: Classified failure of an auth operation
//!
//! ### Onboarding Events
//! - `DraftRestored`: A persisted draft seeded the wizard
//! - `StepChanged`: The wizard moved to another step
//! - `SyncFailed`: Profile sync aborted; the draft was kept
//! - `Completed`: Profile sync finished and the draft was cleared
//!
//! ### Notices
//! User-visible messages (`level`, `title`, `message`).
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// Onboarding wizard events
    Onboarding(OnboardingEvent),
    /// Message meant for the user
    Notice(Notice),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Onboarding(e) => e.description(),
            CoreEvent::Notice(n) => n.title.as_str(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Onboarding(OnboardingEvent::SyncFailed { .. }) => EventSeverity::Error,
            CoreEvent::Notice(notice) => notice.level.severity(),
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::PasswordAdopted { .. })
            | CoreEvent::Onboarding(OnboardingEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the session lifecycle and credential flows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// The startup restore settled.
    SessionRestored {
        /// Principal of the restored session, `None` when signed out.
        principal_id: Option<String>,
    },
    /// A session became live.
    SignedIn { principal_id: String },
    /// The session ended.
    SignedOut { principal_id: Option<String> },
    /// The backend rotated tokens or updated the principal.
    SessionRefreshed {
        principal_id: String,
        /// New expiry (Unix epoch seconds), if known.
        expires_at: Option<i64>,
    },
    /// A one-time code / magic link was sent.
    OneTimeCodeSent {
        /// How long the code stays valid, in minutes.
        valid_for_minutes: u64,
    },
    /// The principal set their password for the first time.
    PasswordAdopted { principal_id: String },
    /// An auth operation failed.
    AuthError {
        /// Operation tag, e.g. `"credentials.request_one_time_code"`.
        operation: String,
        /// Classified error kind, e.g. `"rate_limited"`.
        kind: String,
        /// Human-readable error message.
        message: String,
        /// Whether retrying may succeed.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SessionRestored { .. } => "Session restore settled",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SignedOut { .. } => "User signed out",
            AuthEvent::SessionRefreshed { .. } => "Session refreshed",
            AuthEvent::OneTimeCodeSent { .. } => "One-time code sent",
            AuthEvent::PasswordAdopted { .. } => "Password set",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Onboarding Events
// ============================================================================

/// Events emitted by the onboarding wizard and the profile sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum OnboardingEvent {
    /// A persisted draft was found and loaded.
    DraftRestored {
        /// 1-based step the wizard resumes at.
        step: u8,
    },
    /// The wizard moved between steps.
    StepChanged {
        from: u8,
        to: u8,
        /// `"next"`, `"back"`, `"skip"` or `"jump"`.
        via: String,
    },
    /// Profile sync aborted at `stage`; the draft is kept for retry.
    SyncFailed { stage: String, message: String },
    /// Profile sync finished and the draft was cleared.
    Completed {
        principal_id: String,
        /// Whether a profile row had to be created.
        created_profile: bool,
    },
}

impl OnboardingEvent {
    fn description(&self) -> &str {
        match self {
            OnboardingEvent::DraftRestored { .. } => "Onboarding draft restored",
            OnboardingEvent::StepChanged { .. } => "Onboarding step changed",
            OnboardingEvent::SyncFailed { .. } => "Profile sync failed",
            OnboardingEvent::Completed { .. } => "Onboarding completed",
        }
    }
}

// ============================================================================
// Notices
// ============================================================================

/// How a [`Notice`] should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    fn severity(self) -> EventSeverity {
        match self {
            NoticeLevel::Info | NoticeLevel::Success => EventSeverity::Info,
            NoticeLevel::Warning => EventSeverity::Warning,
            NoticeLevel::Error => EventSeverity::Error,
        }
    }
}

/// A message for the user (toast, inline banner, validation hint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes a user-visible notice. Having no subscriber is not an error.
    pub fn notify(&self, notice: Notice) {
        let _ = self.sender.send(CoreEvent::Notice(notice));
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let notices = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Notice(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(id: &str) -> CoreEvent {
        CoreEvent::Auth(AuthEvent::SignedIn {
            principal_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(signed_in("p1")).is_err());

        // Notices never fail
        bus.notify(Notice::info("Hello", "world"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Onboarding(OnboardingEvent::StepChanged {
            from: 1,
            to: 2,
            via: "next".to_string(),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Notice(_)));

        bus.emit(signed_in("p1")).ok();
        let notice = Notice::success("Check your email", "We sent you a login link.");
        bus.notify(notice.clone());

        assert_eq!(stream.recv().await.unwrap(), CoreEvent::Notice(notice));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::SessionRefreshed {
                principal_id: format!("p{}", i),
                expires_at: Some(1_700_000_000 + i),
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error_event = CoreEvent::Auth(AuthEvent::AuthError {
            operation: "credentials.sign_in_with_password".to_string(),
            kind: "invalid_credentials".to_string(),
            message: "Invalid login credentials".to_string(),
            recoverable: false,
        });
        assert_eq!(error_event.severity(), EventSeverity::Error);
        assert_eq!(signed_in("p1").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Notice(Notice::warning("Offline", "Reconnect")).severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            CoreEvent::Onboarding(OnboardingEvent::DraftRestored { step: 3 }).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(signed_in("p1").description(), "User signed in successfully");
        assert_eq!(
            CoreEvent::Notice(Notice::error("Sign in failed", "x")).description(),
            "Sign in failed"
        );
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(signed_in("p1")).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), signed_in("p1"));
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Onboarding(OnboardingEvent::SyncFailed {
            stage: "insert".to_string(),
            message: "Failed to fetch".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Onboarding\""));
        assert!(json.contains("\"event\":\"SyncFailed\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
