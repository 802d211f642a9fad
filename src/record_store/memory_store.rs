use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error_handling::types::StoreError;
use crate::record_store::{session_key, INDEX_TTL_FLOOR_SECS, SESSION_KEY_PREFIX};
use crate::record_store::store_trait::RecordStore;
use crate::session_management::session::SessionRecord;

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

struct Lock {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Entry>,
    index: HashSet<String>,
    index_expires_at: Option<DateTime<Utc>>,
    locks: HashMap<String, Lock>,
}

impl Inner {
    /// Drops the index wholesale once its own expiry passes, mirroring a
    /// TTL'd set: individual members do not expire, the key does.
    fn expire_index(&mut self, now: DateTime<Utc>) {
        if let Some(deadline) = self.index_expires_at {
            if now >= deadline {
                self.index.clear();
                self.index_expires_at = None;
            }
        }
    }

    fn live_value(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        match self.records.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                self.records.remove(key);
                None
            }
            None => None,
        }
    }
}

/// In-process record store with per-entry expiry.
///
/// Expiry is enforced lazily at read time, which keeps the store free of
/// background tasks and makes sub-second TTLs exact in tests.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        let now = Utc::now();
        let ttl = ChronoDuration::seconds(record.timeout_seconds as i64);
        let index_ttl =
            ChronoDuration::seconds(record.timeout_seconds.max(INDEX_TTL_FLOOR_SECS) as i64);

        let mut inner = self.inner.lock().await;
        inner.expire_index(now);
        inner.records.insert(
            session_key(&record.id),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        inner.index.insert(record.id.clone());
        // Extend the index deadline, never shorten it.
        let candidate = now + index_ttl;
        inner.index_expires_at = Some(match inner.index_expires_at {
            Some(current) if current > candidate => current,
            _ => candidate,
        });
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        match inner.live_value(&session_key(session_id), now) {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn touch(&self, session_id: &str, timeout_seconds: u64) -> Result<(), StoreError> {
        let now = Utc::now();
        let key = session_key(session_id);
        let mut inner = self.inner.lock().await;
        let raw = match inner.live_value(&key, now) {
            Some(raw) => raw,
            // Already expired; the caller learns via a later get.
            None => return Ok(()),
        };
        let mut record: SessionRecord = serde_json::from_str(&raw)?;
        record.last_used = now;
        let value = serde_json::to_string(&record)?;
        inner.records.insert(
            key,
            Entry {
                value,
                expires_at: now + ChronoDuration::seconds(timeout_seconds as i64),
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.records.remove(&session_key(session_id));
        inner.index.remove(session_id);
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        Ok(inner.live_value(&session_key(session_id), now).is_some())
    }

    async fn list_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.expire_index(now);

        let mut sessions = Vec::new();
        if !inner.index.is_empty() {
            let ids: Vec<String> = inner.index.iter().cloned().collect();
            for id in ids {
                if let Some(raw) = inner.live_value(&session_key(&id), now) {
                    match serde_json::from_str(&raw) {
                        Ok(record) => sessions.push(record),
                        Err(e) => debug!("skipping malformed record for {}: {}", id, e),
                    }
                }
            }
            return Ok(sessions);
        }

        // Fallback: scan the key space by prefix.
        let keys: Vec<String> = inner
            .records
            .keys()
            .filter(|k| k.starts_with(SESSION_KEY_PREFIX))
            .cloned()
            .collect();
        for key in keys {
            if let Some(raw) = inner.live_value(&key, now) {
                match serde_json::from_str(&raw) {
                    Ok(record) => sessions.push(record),
                    Err(e) => debug!("skipping malformed record at {}: {}", key, e),
                }
            }
        }
        Ok(sessions)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn acquire_lock(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        if let Some(lock) = inner.locks.get(key) {
            if now < lock.expires_at {
                return Ok(false);
            }
        }
        inner.locks.insert(
            key.to_string(),
            Lock {
                token: token.to_string(),
                expires_at: now
                    + ChronoDuration::milliseconds(ttl.as_millis().min(i64::MAX as u128) as i64),
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.locks.get(key).map(|l| l.token.as_str()) == Some(token) {
            inner.locks.remove(key);
        }
        Ok(())
    }
}
