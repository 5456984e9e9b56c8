//! Profile store interface.
//!
//! The relational profile table is keyed 1:1 by principal id. The core only
//! needs three operations plus an optional native upsert.

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// One row of the profile table.
///
/// `None` fields are left untouched by [`ProfileStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practice_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practice_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_preferences: Option<Vec<String>>,
}

impl ProfileRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Relational profile store.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the row for `id`. "No rows" is `Ok(None)`, never an error.
    async fn select(&self, id: &str) -> BackendResult<Option<ProfileRow>>;

    async fn insert(&self, row: &ProfileRow) -> BackendResult<()>;

    /// Write the non-`None` fields of `row` into the row keyed by `id`.
    async fn update(&self, row: &ProfileRow, id: &str) -> BackendResult<()>;

    /// Whether [`upsert`](Self::upsert) is backed by a native
    /// insert-or-update-by-key.
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Insert `row` or merge it into the existing row with the same id.
    async fn upsert(&self, _row: &ProfileRow) -> BackendResult<()> {
        Err(BackendError::unsupported("upsert"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_row_serialization_skips_empty_fields() {
        let mut row = ProfileRow::new("abc");
        row.username = Some("drlee".to_string());

        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["id"], "abc");
        assert_eq!(object["username"], "drlee");
    }

    struct InsertOnly;

    #[async_trait::async_trait]
    impl ProfileStore for InsertOnly {
        async fn select(&self, _id: &str) -> BackendResult<Option<ProfileRow>> {
            Ok(None)
        }
        async fn insert(&self, _row: &ProfileRow) -> BackendResult<()> {
            Ok(())
        }
        async fn update(&self, _row: &ProfileRow, _id: &str) -> BackendResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_upsert_defaults_to_unsupported() {
        let store = InsertOnly;
        assert!(!store.supports_upsert());
        let err = store.upsert(&ProfileRow::new("abc")).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("unsupported"));
    }
}
