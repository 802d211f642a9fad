use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::cluster::types::{EndpointObject, WorkloadObject, WorkloadRole};
use crate::error_handling::ClusterError;

/// Abstract create/read/delete capability over the platform that hosts
/// browser workloads. The lifecycle controller and the janitor are
/// written against this trait so they can be exercised with an in-memory
/// fake.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Create the workload for a session. Fails with
    /// [`ClusterError::Conflict`] if a workload with the deterministic
    /// session name already exists.
    async fn create_workload(
        &self,
        session_id: &str,
        options: &Map<String, Value>,
    ) -> Result<WorkloadObject, ClusterError>;

    /// Create an unclaimed prewarmed spare with a fresh random name.
    async fn create_prewarm_workload(&self) -> Result<WorkloadObject, ClusterError>;

    /// Relabel a prewarmed spare as the active workload of a session so
    /// the pool resizer stops counting it. Fails with
    /// [`ClusterError::NotFound`] if the workload is gone.
    async fn claim_workload(
        &self,
        name: &str,
        session_id: &str,
    ) -> Result<WorkloadObject, ClusterError>;

    /// Create the routing endpoint for a session. The selector names the
    /// workload to front, either by session label (cold path) or by
    /// explicit workload name (prewarm hand-off).
    async fn create_endpoint(
        &self,
        session_id: &str,
        selector: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<EndpointObject, ClusterError>;

    /// Delete a workload by name. Deleting a workload that does not
    /// exist is not an error.
    async fn delete_workload(&self, name: &str) -> Result<(), ClusterError>;

    /// Delete an endpoint by name. Deleting an endpoint that does not
    /// exist is not an error.
    async fn delete_endpoint(&self, name: &str) -> Result<(), ClusterError>;

    /// All workloads owned by this service carrying the given role.
    async fn list_workloads(&self, role: WorkloadRole)
        -> Result<Vec<WorkloadObject>, ClusterError>;

    /// All endpoints owned by this service.
    async fn list_endpoints(&self) -> Result<Vec<EndpointObject>, ClusterError>;

    /// Whether the workload's process is up and accepting connections.
    async fn is_ready(&self, workload: &WorkloadObject) -> Result<bool, ClusterError>;

    /// Cheap connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), ClusterError>;
}
