//! Key-value storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed key-value store.
///
/// Plays the role `localStorage` plays in a browser host: the onboarding
/// draft and the identity backend's persisted session live here.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized key-value store");

        Ok(Self { pool })
    }

    /// In-memory store (for testing).
    ///
    /// Pinned to a single connection; every SQLite in-memory connection is a
    /// separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// `<data dir>/practice-portal/storage.db`, falling back to the working
    /// directory when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("practice-portal")
            .join("storage.db")
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to get value: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to set value: {}", e)))?;

        debug!(key = key, "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to delete value: {}", e)))?;

        debug!(key = key, "Removed value");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to list keys: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to check key: {}", e)))?;

        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_operations() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();

        store.set_string("onboarding_progress", "3").await.unwrap();
        assert_eq!(
            store.get_string("onboarding_progress").await.unwrap(),
            Some("3".to_string())
        );

        store.set_string("onboarding_progress", "4").await.unwrap();
        assert_eq!(
            store.get_string("onboarding_progress").await.unwrap(),
            Some("4".to_string())
        );

        store.remove("onboarding_progress").await.unwrap();
        assert_eq!(store.get_string("onboarding_progress").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_records_update_time() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();
        let before = Utc::now().timestamp();

        store.set_string("onboarding_data", "{}").await.unwrap();

        let updated_at: i64 = sqlx::query("SELECT updated_at FROM kv_store WHERE key = ?")
            .bind("onboarding_data")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get(0);
        assert!(updated_at >= before);
        assert!(updated_at <= Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();
        store.remove("never-set").await.unwrap();
        assert!(!store.has_key("never-set").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_keys() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();

        store.set_string("sb-auth-token", "x").await.unwrap();
        store.set_string("onboarding_data", "{}").await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["onboarding_data", "sb-auth-token"]);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!(
            "practice-kv-{}",
            std::process::id()
        ));
        let path = dir.join("storage.db");

        {
            let store = SqliteKeyValueStore::new(path.clone()).await.unwrap();
            store.set_string("k", "v").await.unwrap();
        }

        let reopened = SqliteKeyValueStore::new(path).await.unwrap();
        assert_eq!(reopened.get_string("k").await.unwrap(), Some("v".to_string()));

        let _ = std::fs::remove_dir_all(dir);
    }
}
