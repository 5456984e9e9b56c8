//! # Core Configuration Module
//!
//! Provides configuration management for the practice portal core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all collaborators and settings the core needs. It
//! enforces fail-fast validation so a host finds out about a missing bridge
//! at startup, not on the first sign-in attempt.
//!
//! ## Required Dependencies
//!
//! - `IdentityBackend` - Sessions, credentials, user metadata
//! - `ProfileStore` - Profile rows keyed by principal id
//! - `KeyValueStore` - Durable storage for the onboarding draft
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - Online flag checked before one-time-code requests
//! - `ErrorTracker` - Error reporting (default: drop reports)
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, `bridge-desktop` supplies
//! the key-value store, network monitor and error tracker if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{AuthSettings, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .identity_backend(Arc::new(MyIdentityBackend::new()))
//!     .profile_store(Arc::new(MyProfileStore::new()))
//!     .key_value_store(Arc::new(MyLocalStorage::new()))
//!     .auth_settings(AuthSettings::new("https://portal.example.com"))
//!     .build()?;
//! ```
//!
//! Settings structs derive `serde` with field defaults so hosts can load
//! them from a JSON file and override only what differs.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    Clock, ErrorTracker, IdentityBackend, KeyValueStore, NetworkMonitor, ProfileStore,
    SystemClock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Core configuration for the practice portal core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Identity backend (required)
    pub identity_backend: Arc<dyn IdentityBackend>,

    /// Profile row store (required)
    pub profile_store: Arc<dyn ProfileStore>,

    /// Durable key-value storage (required)
    pub key_value_store: Arc<dyn KeyValueStore>,

    /// Connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub error_tracker: Arc<dyn ErrorTracker>,

    pub clock: Arc<dyn Clock>,

    pub auth: AuthSettings,

    pub onboarding: OnboardingSettings,

    pub password_policy: PasswordPolicy,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("identity_backend", &"IdentityBackend { ... }")
            .field("profile_store", &"ProfileStore { ... }")
            .field("key_value_store", &"KeyValueStore { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("auth", &self.auth)
            .field("onboarding", &self.onboarding)
            .field("password_policy", &self.password_policy)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Settings for the credential flows and the callback handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Public origin of the portal; emailed links redirect here.
    pub site_url: String,

    /// Client-side timeout for a one-time-code request.
    pub one_time_code_timeout_secs: u64,

    /// How long an emailed code stays valid (shown to the user).
    pub one_time_code_validity_minutes: u64,

    /// Create an account when a one-time code is requested for an unknown email.
    pub allow_sign_up_on_demand: bool,

    /// Storage keys starting with this prefix are identity-backend artifacts
    /// and get cleared before a one-time-code request.
    pub auth_storage_prefix: String,

    pub callback_retry: RetrySettings,

    pub routes: RouteSettings,
}

impl AuthSettings {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            ..Default::default()
        }
    }

    pub fn one_time_code_timeout(&self) -> Duration {
        Duration::from_secs(self.one_time_code_timeout_secs)
    }

    /// `site_url` joined with `route`.
    pub fn redirect_url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".to_string(),
            one_time_code_timeout_secs: 15,
            one_time_code_validity_minutes: 15,
            allow_sign_up_on_demand: false,
            auth_storage_prefix: "sb-".to_string(),
            callback_retry: RetrySettings::default(),
            routes: RouteSettings::default(),
        }
    }
}

/// Fixed-backoff retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetrySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 2_000,
        }
    }
}

/// Opaque destination strings handed to the host router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub login: String,
    pub set_password: String,
    /// Home mounts the onboarding wizard while onboarding is incomplete.
    pub home: String,
    pub dashboard: String,
    pub callback: String,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            set_password: "/set-password".to_string(),
            home: "/".to_string(),
            dashboard: "/dashboard".to_string(),
            callback: "/auth/callback".to_string(),
        }
    }
}

/// Where the onboarding wizard keeps its draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingSettings {
    pub progress_key: String,
    pub data_key: String,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            progress_key: "onboarding_progress".to_string(),
            data_key: "onboarding_data".to_string(),
        }
    }
}

/// Password strength rules shared by sign-up and password adoption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - `site_url` is an absolute http(s) URL
    /// - Timeouts and validity windows are non-zero
    /// - Draft storage keys are non-empty and distinct
    /// - The password policy demands at least one character
    pub fn validate(&self) -> Result<()> {
        let site = Url::parse(&self.auth.site_url).map_err(|e| {
            Error::Config(format!("Invalid site_url '{}': {}", self.auth.site_url, e))
        })?;
        if !matches!(site.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "site_url must use http or https, got '{}'",
                site.scheme()
            )));
        }

        if self.auth.one_time_code_timeout_secs == 0 {
            return Err(Error::Config(
                "One-time-code timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.auth.one_time_code_validity_minutes == 0 {
            return Err(Error::Config(
                "One-time-code validity must be greater than 0 minutes".to_string(),
            ));
        }

        if self.auth.auth_storage_prefix.is_empty() {
            return Err(Error::Config(
                "auth_storage_prefix cannot be empty; it would clear every stored key".to_string(),
            ));
        }

        let keys = &self.onboarding;
        if keys.progress_key.is_empty() || keys.data_key.is_empty() {
            return Err(Error::Config(
                "Onboarding storage keys cannot be empty".to_string(),
            ));
        }
        if keys.progress_key == keys.data_key {
            return Err(Error::Config(
                "Onboarding progress and data keys must differ".to_string(),
            ));
        }

        if self.password_policy.min_length == 0 {
            return Err(Error::Config(
                "Password minimum length must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn identity_backend_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "IdentityBackend".to_string(),
        message: "IdentityBackend implementation is required for sessions and sign-in. \
                 Inject an adapter around your identity provider's client."
            .to_string(),
    }
}

fn profile_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ProfileStore".to_string(),
        message: "ProfileStore implementation is required for onboarding profile sync. \
                 Inject an adapter around the profiles table."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn key_value_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "KeyValueStore implementation is required for the onboarding draft. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteKeyValueStore. \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_key_value_store() -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::SqliteKeyValueStore;
    use core_async::runtime::{Handle, Runtime};
    use std::thread;

    let path = SqliteKeyValueStore::default_path();

    let init_store = move || -> Result<SqliteKeyValueStore> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default KeyValueStore: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteKeyValueStore::new(path))
            .map_err(|e| Error::Internal(format!("Failed to initialize default KeyValueStore: {}", e)))
    };

    // A runtime cannot be started from inside another one
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(init_store).join().map_err(|_| {
            Error::Internal(
                "Worker thread panicked while creating default KeyValueStore".to_string(),
            )
        })??,
        Err(_) => init_store()?,
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_key_value_store() -> Result<Arc<dyn KeyValueStore>> {
    Err(key_value_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_error_tracker() -> Arc<dyn ErrorTracker> {
    Arc::new(bridge_desktop::TracingErrorTracker)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_error_tracker() -> Arc<dyn ErrorTracker> {
    Arc::new(bridge_traits::NoopErrorTracker)
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    identity_backend: Option<Arc<dyn IdentityBackend>>,
    profile_store: Option<Arc<dyn ProfileStore>>,
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    error_tracker: Option<Arc<dyn ErrorTracker>>,
    clock: Option<Arc<dyn Clock>>,
    auth: Option<AuthSettings>,
    onboarding: Option<OnboardingSettings>,
    password_policy: Option<PasswordPolicy>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn identity_backend(mut self, backend: Arc<dyn IdentityBackend>) -> Self {
        self.identity_backend = Some(backend);
        self
    }

    pub fn profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profile_store = Some(store);
        self
    }

    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn error_tracker(mut self, tracker: Arc<dyn ErrorTracker>) -> Self {
        self.error_tracker = Some(tracker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn auth_settings(mut self, settings: AuthSettings) -> Self {
        self.auth = Some(settings);
        self
    }

    pub fn onboarding_settings(mut self, settings: OnboardingSettings) -> Self {
        self.onboarding = Some(settings);
        self
    }

    pub fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = Some(policy);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when `IdentityBackend`, `ProfileStore`
    ///   or (without `desktop-shims`) `KeyValueStore` was not provided
    /// - [`Error::Config`] when a setting fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let identity_backend = self
            .identity_backend
            .ok_or_else(identity_backend_missing_error)?;

        let profile_store = self.profile_store.ok_or_else(profile_store_missing_error)?;

        let key_value_store = match self.key_value_store {
            Some(store) => store,
            None => provide_default_key_value_store()?,
        };

        let config = CoreConfig {
            identity_backend,
            profile_store,
            key_value_store,
            network_monitor: self
                .network_monitor
                .or_else(provide_default_network_monitor),
            error_tracker: self
                .error_tracker
                .unwrap_or_else(provide_default_error_tracker),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            auth: self.auth.unwrap_or_default(),
            onboarding: self.onboarding.unwrap_or_default(),
            password_policy: self.password_policy.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
