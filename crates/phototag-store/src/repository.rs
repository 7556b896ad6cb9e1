//! SQLite implementation of ILocalStore
//!
//! Every key maps to one row of the `kv` table. Writes are upserts, so the
//! last writer wins per key; `updated_at` records the write time as
//! RFC 3339 for inspection only.

use chrono::Utc;
use sqlx::SqlitePool;

use phototag_core::ports::ILocalStore;

/// SQLite-based implementation of the local store port
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored keys
    pub async fn len(&self) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Returns true if the store holds no keys
    pub async fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        tracing::trace!(key, removed = result.rows_affected(), "Deleted key");
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM kv ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }
}
