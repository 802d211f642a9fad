use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Label applied to every object managed by this service.
pub const APP_LABEL_KEY: &str = "app";
pub const APP_LABEL_VALUE: &str = "browser-session";

/// Label distinguishing active workloads from prewarmed spares.
pub const ROLE_LABEL_KEY: &str = "role";

/// Label carrying the owning session id on workloads.
pub const SESSION_LABEL_KEY: &str = "sessionId";

/// Selector label used when an endpoint is pointed at one specific
/// workload by name (the prewarm hand-off path).
pub const WORKLOAD_NAME_LABEL_KEY: &str = "workloadName";

/// Annotations recorded on endpoints so the janitor can reclaim
/// cluster-side resources even when the session record has expired.
pub const SESSION_ID_ANNOTATION: &str = "ruche/session-id";
pub const TARGET_WORKLOAD_ANNOTATION: &str = "ruche/target-workload";
pub const HAND_OFF_ANNOTATION: &str = "ruche/hand-off";

pub const SESSION_NAME_PREFIX: &str = "browser-session-";
pub const PREWARM_NAME_PREFIX: &str = "browser-prewarm-";

/// Deterministic workload name for a session, used both at creation and
/// as the janitor's fallback when an endpoint carries no target
/// annotation.
pub fn session_workload_name(session_id: &str) -> String {
    format!("{}{}", SESSION_NAME_PREFIX, session_id)
}

/// Deterministic endpoint name for a session.
pub fn session_endpoint_name(session_id: &str) -> String {
    format!("{}{}", SESSION_NAME_PREFIX, session_id)
}

/// Fresh random name for a prewarmed spare workload.
pub fn prewarm_workload_name() -> String {
    format!("{}{}", PREWARM_NAME_PREFIX, Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadRole {
    Active,
    Prewarm,
}

impl WorkloadRole {
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkloadRole::Active => "active",
            WorkloadRole::Prewarm => "prewarm",
        }
    }

    pub fn name_prefix(&self) -> &'static str {
        match self {
            WorkloadRole::Active => SESSION_NAME_PREFIX,
            WorkloadRole::Prewarm => PREWARM_NAME_PREFIX,
        }
    }
}

/// A running (or starting) browser workload as seen by the backend.
#[derive(Debug, Clone)]
pub struct WorkloadObject {
    pub name: String,
    pub role: WorkloadRole,
    pub labels: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub ready: bool,
    /// host:port the workload listens on, once known.
    pub address: Option<String>,
}

impl WorkloadObject {
    pub fn session_id(&self) -> Option<&str> {
        self.labels.get(SESSION_LABEL_KEY).map(String::as_str)
    }
}

/// A stable routing endpoint fronting exactly one workload.
#[derive(Debug, Clone)]
pub struct EndpointObject {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl EndpointObject {
    /// Owning session id, read from the annotation written at creation.
    pub fn session_id(&self) -> Option<&str> {
        self.annotations.get(SESSION_ID_ANNOTATION).map(String::as_str)
    }

    /// Name of the workload this endpoint routes to, if annotated.
    pub fn target_workload(&self) -> Option<&str> {
        self.annotations
            .get(TARGET_WORKLOAD_ANNOTATION)
            .map(String::as_str)
    }
}

/// Whether an endpoint belongs to this service. Matches by the app label
/// or, for objects created before labelling was introduced, by the
/// deterministic name prefix.
pub fn is_session_endpoint(endpoint: &EndpointObject) -> bool {
    endpoint.labels.get(APP_LABEL_KEY).map(String::as_str) == Some(APP_LABEL_VALUE)
        || endpoint.name.starts_with(SESSION_NAME_PREFIX)
}

/// Whether a workload belongs to this service and carries the given role.
/// The role label wins when present; the name prefix is only consulted
/// for unlabelled objects, since a claimed prewarm keeps its prewarm
/// name but is relabelled active.
pub fn is_workload_with_role(workload: &WorkloadObject, role: WorkloadRole) -> bool {
    match workload.labels.get(ROLE_LABEL_KEY) {
        Some(label) => {
            workload.labels.get(APP_LABEL_KEY).map(String::as_str) == Some(APP_LABEL_VALUE)
                && label == role.as_label()
        }
        None => workload.name.starts_with(role.name_prefix()),
    }
}

pub fn base_workload_labels(role: WorkloadRole) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL_KEY.to_string(), APP_LABEL_VALUE.to_string());
    labels.insert(ROLE_LABEL_KEY.to_string(), role.as_label().to_string());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_names_share_the_session_prefix() {
        assert_eq!(session_workload_name("abc"), "browser-session-abc");
        assert_eq!(session_endpoint_name("abc"), "browser-session-abc");
        assert!(prewarm_workload_name().starts_with(PREWARM_NAME_PREFIX));
    }

    #[test]
    fn endpoint_matching_falls_back_to_name_prefix() {
        let unlabelled = EndpointObject {
            name: "browser-session-x".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            address: "10.0.0.1:3000".to_string(),
            created_at: Utc::now(),
        };
        assert!(is_session_endpoint(&unlabelled));

        let foreign = EndpointObject {
            name: "postgres-primary".to_string(),
            ..unlabelled.clone()
        };
        assert!(!is_session_endpoint(&foreign));
    }

    #[test]
    fn workload_role_matching_checks_labels_and_prefix() {
        let mut labels = base_workload_labels(WorkloadRole::Prewarm);
        labels.insert(SESSION_LABEL_KEY.to_string(), "s1".to_string());
        let workload = WorkloadObject {
            name: "something-else".to_string(),
            role: WorkloadRole::Prewarm,
            labels,
            created_at: Utc::now(),
            ready: false,
            address: None,
        };
        assert!(is_workload_with_role(&workload, WorkloadRole::Prewarm));
        assert!(!is_workload_with_role(&workload, WorkloadRole::Active));
        assert_eq!(workload.session_id(), Some("s1"));
    }
}
