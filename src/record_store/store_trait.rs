//! The `RecordStore` trait: TTL-bounded session persistence plus a small
//! advisory-lock facility for cross-process coordination.

use async_trait::async_trait;
use std::time::Duration;

use crate::error_handling::types::StoreError;
use crate::session_management::session::SessionRecord;

/// Uniform API over session record backends.
///
/// All mutations affect only the store; no cluster calls happen here.
/// Callers must treat `StoreError::NotFound` from `get` as "session does
/// not exist", never as a transient fault.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upserts the record with expiry `record.timeout_seconds`, and adds the
    /// id to the secondary index whose own expiry is
    /// `max(timeout_seconds, INDEX_TTL_FLOOR_SECS)`.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Returns the record or `StoreError::NotFound`.
    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError>;

    /// Re-reads the record, advances `last_used`, and re-writes it with a
    /// fresh TTL. A record that has already expired makes this a no-op, not
    /// an error: the caller discovers the session is gone via `get`.
    async fn touch(&self, session_id: &str, timeout_seconds: u64) -> Result<(), StoreError>;

    /// Removes the record and its index entry. Idempotent.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;

    /// True when a live record exists for the id.
    async fn exists(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Lists all known sessions. Prefers the secondary index; when the
    /// index is empty, falls back to a key-prefix scan so a lost index
    /// never makes sessions permanently invisible.
    async fn list_all(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Reachability check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Conditionally creates a short-lived mutual-exclusion token. Returns
    /// false when another live token holds the key. Advisory only:
    /// duplicate execution must be safe, merely wasteful.
    async fn acquire_lock(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Deletes the lock if the token still matches; otherwise leaves it.
    async fn release_lock(&self, key: &str, token: &str) -> Result<(), StoreError>;
}
