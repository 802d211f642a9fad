//! Session record store.
//!
//! The single source of truth for session existence. Records carry a TTL:
//! a session whose `last_used` is not refreshed within `timeout_seconds`
//! disappears from the store and its cluster resources become orphans.
//!
//! Components:
//! - `store_trait`: the `RecordStore` trait defining the uniform API.
//! - `memory_store`: in-process TTL map, used by tests and single-process
//!   deployments.
//! - `database_store`: SQLite-backed implementation for durable records.

pub mod database_store;
pub mod memory_store;
pub mod store_trait;

pub use database_store::DatabaseStore;
pub use memory_store::MemoryStore;
pub use store_trait::RecordStore;

/// Key prefix for session records.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Key of the secondary index of live session ids.
pub const SESSION_INDEX_KEY: &str = "sessions:index";

/// Floor (seconds) for the index key's own expiry, so the index outlives
/// any single record's TTL during bursts.
pub const INDEX_TTL_FLOOR_SECS: u64 = 3600;

/// Builds the store key for a session id.
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}
