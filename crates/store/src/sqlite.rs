//! SQLite store: buffers survive a process restart.
//!
//! Single table keyed by store key with an `expires_at` column (epoch ms).
//! Reads ignore expired rows; [`SqliteStore::purge_expired`] reclaims them.

use async_trait::async_trait;
use chatbuffer_core::error::StoreError;
use chatbuffer_core::store::BackingStore;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// A persistent key-value store on SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(2));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(2))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite buffer store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY NOT NULL,
                value      BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("kv_store table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_store_expires_at ON kv_store(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("expires_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Delete every expired row. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(result.rows_affected())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn backend_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl BackingStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT value FROM kv_store WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = now_ms() + ttl.as_millis() as i64;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let expires_at = sqlx::query_scalar::<_, i64>(
            "DELETE FROM kv_store WHERE key = ? RETURNING expires_at",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(expires_at.is_some_and(|at| at > now_ms()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffers.db");
        let store = SqliteStore::new(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn set_get_delete() {
        let (_dir, store) = temp_store().await;
        store
            .set_with_ttl("buffer:1", b"hola".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("buffer:1").await.unwrap(), Some(b"hola".to_vec()));
        assert!(store.delete("buffer:1").await.unwrap());
        assert_eq!(store.get("buffer:1").await.unwrap(), None);
        assert!(!store.delete("buffer:1").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_replaces_value() {
        let (_dir, store) = temp_store().await;
        let ttl = Duration::from_secs(60);
        store.set_with_ttl("k", b"1".to_vec(), ttl).await.unwrap();
        store.set_with_ttl("k", b"2".to_vec(), ttl).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn zero_ttl_is_immediately_expired() {
        let (_dir, store) = temp_store().await;
        store.set_with_ttl("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("buffers.db").display());
        {
            let store = SqliteStore::new(&url).await.unwrap();
            store
                .set_with_ttl("k", b"persisted".to_vec(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        let store = SqliteStore::new(&url).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"persisted".to_vec()));
        assert!(store.ping().await.is_ok());
    }
}
