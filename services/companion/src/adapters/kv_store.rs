//! services/companion/src/adapters/kv_store.rs
//!
//! The SQLite-backed implementation of the `KeyValueStore` port. Each key holds
//! one JSON snapshot as text.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use study_companion_core::ports::{KeyValueStore, PortError, PortResult};
use tracing::debug;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the key/value table if it is missing.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(FromRow)]
struct EntryRecord {
    value: String,
}

fn db_error(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> PortResult<Option<serde_json::Value>> {
        let record = sqlx::query_as::<_, EntryRecord>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        record
            .map(|r| serde_json::from_str(&r.value).map_err(|_| PortError::Corrupted(key.to_string())))
            .transpose()
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> PortResult<()> {
        let text = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        debug!("Stored '{}' ({} bytes)", key, text.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
