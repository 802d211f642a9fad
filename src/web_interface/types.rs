use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session_management::{SessionRecord, SessionStatus};

/// API error payload
#[derive(Serialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Requested TTL in seconds, clamped to the configured maximum.
    pub timeout: Option<u64>,
    /// Opaque launch options handed through to the workload.
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SessionRecord> for CreateSessionResponse {
    fn from(record: SessionRecord) -> Self {
        CreateSessionResponse {
            session_id: record.id,
            status: record.status,
            endpoint_address: record.endpoint_address,
            endpoint_name: record.endpoint_name,
            workload_name: record.workload_name,
            error: record.notes,
        }
    }
}

#[derive(Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionRecord>,
    pub count: usize,
}

/// A session record plus a point-in-time health observation.
#[derive(Serialize)]
pub struct SessionWithHealth {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub healthy: bool,
}

#[derive(Serialize)]
pub struct DeleteSessionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub namespace: String,
    pub base_path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
