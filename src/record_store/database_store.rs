use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::Duration;

use crate::error_handling::types::StoreError;
use crate::record_store::{session_key, INDEX_TTL_FLOOR_SECS, SESSION_KEY_PREFIX};
use crate::record_store::store_trait::RecordStore;
use crate::session_management::session::SessionRecord;

/// SQLite-backed record store.
///
/// Rows carry an absolute expiry in unix milliseconds; expiry is enforced
/// at read time (expired rows are invisible and reaped lazily), which gives
/// the same visible TTL semantics as the in-memory store while surviving
/// process restarts.
pub struct DatabaseStore {
    pool: Pool<Sqlite>,
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl DatabaseStore {
    /// Opens (or creates) the database file and ensures the schema.
    pub async fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path_ref)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS record_index (
                session_id TEXT PRIMARY KEY
            );",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                expires_at INTEGER NOT NULL
            );",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS locks (
                key TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;

        Ok(DatabaseStore { pool })
    }

    /// Clears the index wholesale once its own deadline has passed.
    async fn expire_index(&self, now: i64) -> Result<(), StoreError> {
        let expired: Option<i64> =
            sqlx::query_scalar("SELECT expires_at FROM index_meta WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        if let Some(deadline) = expired {
            if now >= deadline {
                sqlx::query("DELETE FROM record_index")
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
                sqlx::query("DELETE FROM index_meta")
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn live_value(&self, key: &str, now: i64) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value, expires_at FROM records WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => {
                let expires_at: i64 = row.try_get("expires_at").map_err(db_err)?;
                if now < expires_at {
                    Ok(Some(row.try_get("value").map_err(db_err)?))
                } else {
                    sqlx::query("DELETE FROM records WHERE key = ?1")
                        .bind(key)
                        .execute(&self.pool)
                        .await
                        .map_err(db_err)?;
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStore for DatabaseStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        let now = now_millis();
        let expires_at = now + record.timeout_seconds as i64 * 1000;
        let index_expires_at =
            now + record.timeout_seconds.max(INDEX_TTL_FLOOR_SECS) as i64 * 1000;

        self.expire_index(now).await?;
        sqlx::query(
            "INSERT INTO records (key, session_id, value, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               expires_at = excluded.expires_at",
        )
        .bind(session_key(&record.id))
        .bind(&record.id)
        .bind(&value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        sqlx::query("INSERT INTO record_index (session_id) VALUES (?1) ON CONFLICT DO NOTHING")
            .bind(&record.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        // Extend the index deadline, never shorten it.
        sqlx::query(
            "INSERT INTO index_meta (id, expires_at) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET
               expires_at = MAX(index_meta.expires_at, excluded.expires_at)",
        )
        .bind(index_expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        match self.live_value(&session_key(session_id), now_millis()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn touch(&self, session_id: &str, timeout_seconds: u64) -> Result<(), StoreError> {
        let now = now_millis();
        let key = session_key(session_id);
        let raw = match self.live_value(&key, now).await? {
            Some(raw) => raw,
            None => return Ok(()),
        };
        let mut record: SessionRecord = serde_json::from_str(&raw)?;
        record.last_used = Utc::now();
        let value = serde_json::to_string(&record)?;
        sqlx::query("UPDATE records SET value = ?1, expires_at = ?2 WHERE key = ?3")
            .bind(&value)
            .bind(now + timeout_seconds as i64 * 1000)
            .bind(&key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE key = ?1")
            .bind(session_key(session_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM record_index WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .live_value(&session_key(session_id), now_millis())
            .await?
            .is_some())
    }

    async fn list_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let now = now_millis();
        self.expire_index(now).await?;

        let mut sessions = Vec::new();
        let ids: Vec<String> = sqlx::query_scalar("SELECT session_id FROM record_index")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if !ids.is_empty() {
            for id in ids {
                if let Some(raw) = self.live_value(&session_key(&id), now).await? {
                    match serde_json::from_str(&raw) {
                        Ok(record) => sessions.push(record),
                        Err(e) => debug!("skipping malformed record for {}: {}", id, e),
                    }
                }
            }
            return Ok(sessions);
        }

        // Fallback: scan by key prefix.
        let rows = sqlx::query(
            "SELECT value FROM records WHERE key LIKE ?1 AND expires_at > ?2",
        )
        .bind(format!("{}%", SESSION_KEY_PREFIX))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        for row in rows {
            let raw: String = row.try_get("value").map_err(db_err)?;
            match serde_json::from_str(&raw) {
                Ok(record) => sessions.push(record),
                Err(e) => debug!("skipping malformed record during scan: {}", e),
            }
        }
        Ok(sessions)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn acquire_lock(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = now_millis();
        sqlx::query("DELETE FROM locks WHERE key = ?1 AND expires_at <= ?2")
            .bind(key)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        let result = sqlx::query(
            "INSERT INTO locks (key, token, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(token)
        .bind(now + ttl.as_millis().min(i64::MAX as u128) as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM locks WHERE key = ?1 AND token = ?2")
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
