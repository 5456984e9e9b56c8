//! Durable key-value storage abstraction.
//!
//! The onboarding wizard persists its draft here so a page reload resumes
//! where the user left off, and the credential flow clears stale identity
//! artifacts from it before requesting a one-time code.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Durable string key-value store.
///
/// Abstracts platform-specific persistence:
/// - Web: `window.localStorage`
/// - Desktop: SQLite-backed table (see `bridge-desktop`)
/// - Mobile: UserDefaults / SharedPreferences
///
/// Writes are last-write-wins; no cross-key atomicity is offered.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember_step(store: &dyn KeyValueStore, step: u8) -> Result<()> {
///     store.set_string("onboarding_progress", &step.to_string()).await
/// }
/// ```
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a string value; `Ok(None)` when the key is absent.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a string value, replacing any previous one.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all stored keys.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Check if a key exists.
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn set_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string(value)?;
    store.set_string(key, &json).await
}

/// Load and deserialize the JSON stored under `key`.
///
/// Returns `Ok(None)` when the key is absent; malformed JSON is an error so
/// the caller decides whether to discard it.
pub async fn get_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match store.get_string(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
