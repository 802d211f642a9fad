use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Session lifecycle states.
///
/// Transitions only move forward: `Pending -> Live` or `Pending -> Failed`.
/// There is no terminal "deleted" state; deletion removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Live,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Live => write!(f, "live"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The session record persisted to the record store.
///
/// Presence of this record is authoritative for "this session is still
/// wanted"; once it expires or is deleted, any matching cluster objects are
/// orphans for the janitor to reclaim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Stable session identifier (UUID v4), the correlation key across the
    /// record store, cluster object names and routing.
    pub id: String,

    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,

    /// Advanced on every proxied request; the basis for idle reclamation
    /// via the record TTL.
    pub last_used: DateTime<Utc>,

    /// Per-session TTL in seconds; doubles as the record's store expiry.
    pub timeout_seconds: u64,

    /// Name of the routing endpoint created for this session, if any.
    pub endpoint_name: Option<String>,

    /// Name of the workload backing this session, if any.
    pub workload_name: Option<String>,

    /// Cached network address of the endpoint. Resolved during
    /// provisioning; the forwarder uses this without a cluster lookup.
    pub endpoint_address: Option<String>,

    /// Diagnostic note, populated on failure paths only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Opaque caller-supplied configuration, passed through unmodified to
    /// the workload environment.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl SessionRecord {
    /// Creates a fresh pending record for a newly generated id.
    pub fn new_pending(id: String, timeout_seconds: u64, options: Map<String, Value>) -> Self {
        let now = Utc::now();
        SessionRecord {
            id,
            status: SessionStatus::Pending,
            created_at: now,
            last_used: now,
            timeout_seconds,
            endpoint_name: None,
            workload_name: None,
            endpoint_address: None,
            notes: None,
            options,
        }
    }

    /// Marks the record failed with a diagnostic note.
    pub fn fail(&mut self, note: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.notes = Some(note.into());
    }

    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }
}
