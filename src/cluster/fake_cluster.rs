//! In-memory [`ClusterBackend`] used by lifecycle, janitor, and web tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::cluster::backend::ClusterBackend;
use crate::cluster::types::{
    self, EndpointObject, WorkloadObject, WorkloadRole, SESSION_ID_ANNOTATION, SESSION_LABEL_KEY,
    WORKLOAD_NAME_LABEL_KEY,
};
use crate::error_handling::ClusterError;

#[derive(Default)]
struct FakeState {
    workloads: HashMap<String, WorkloadObject>,
    endpoints: HashMap<String, EndpointObject>,
}

/// Fake backend with injectable failures and controllable readiness.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
    pub fail_workload_create: AtomicBool,
    pub fail_endpoint_create: AtomicBool,
    pub fail_listing: AtomicBool,
    /// Readiness reported for workloads created after this point.
    pub workloads_start_ready: AtomicBool,
}

impl FakeCluster {
    pub fn new() -> Self {
        let fake = FakeCluster::default();
        fake.workloads_start_ready.store(true, Ordering::SeqCst);
        fake
    }

    pub fn workload_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .workloads
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn endpoint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .endpoints
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn set_ready(&self, workload_name: &str, ready: bool) {
        if let Some(w) = self.state.lock().unwrap().workloads.get_mut(workload_name) {
            w.ready = ready;
        }
    }

    /// Plants a pre-existing workload, as the janitor would find after a
    /// controller crash.
    pub fn insert_workload(
        &self,
        name: &str,
        role: WorkloadRole,
        session_id: Option<&str>,
        created_at: DateTime<Utc>,
        ready: bool,
    ) {
        let mut labels = types::base_workload_labels(role);
        if let Some(id) = session_id {
            labels.insert(SESSION_LABEL_KEY.to_string(), id.to_string());
        }
        let object = WorkloadObject {
            name: name.to_string(),
            role,
            labels,
            created_at,
            ready,
            address: Some("10.0.0.1:3000".to_string()),
        };
        self.state
            .lock()
            .unwrap()
            .workloads
            .insert(name.to_string(), object);
    }

    /// Plants a pre-existing endpoint with the given annotations.
    pub fn insert_endpoint(&self, name: &str, annotations: BTreeMap<String, String>) {
        let mut labels = BTreeMap::new();
        labels.insert(
            types::APP_LABEL_KEY.to_string(),
            types::APP_LABEL_VALUE.to_string(),
        );
        let object = EndpointObject {
            name: name.to_string(),
            labels,
            annotations,
            address: format!("{}.test.svc:3000", name),
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .endpoints
            .insert(name.to_string(), object);
    }
}

#[async_trait]
impl ClusterBackend for FakeCluster {
    async fn create_workload(
        &self,
        session_id: &str,
        _options: &Map<String, Value>,
    ) -> Result<WorkloadObject, ClusterError> {
        if self.fail_workload_create.load(Ordering::SeqCst) {
            return Err(ClusterError::CreateFailed(
                "injected workload failure".to_string(),
            ));
        }
        let name = types::session_workload_name(session_id);
        let mut state = self.state.lock().unwrap();
        if state.workloads.contains_key(&name) {
            return Err(ClusterError::Conflict(format!(
                "workload {} already exists",
                name
            )));
        }
        let mut labels = types::base_workload_labels(WorkloadRole::Active);
        labels.insert(SESSION_LABEL_KEY.to_string(), session_id.to_string());
        let object = WorkloadObject {
            name: name.clone(),
            role: WorkloadRole::Active,
            labels,
            created_at: Utc::now(),
            ready: self.workloads_start_ready.load(Ordering::SeqCst),
            address: Some(format!("{}.test:3000", name)),
        };
        state.workloads.insert(name, object.clone());
        Ok(object)
    }

    async fn create_prewarm_workload(&self) -> Result<WorkloadObject, ClusterError> {
        if self.fail_workload_create.load(Ordering::SeqCst) {
            return Err(ClusterError::CreateFailed(
                "injected workload failure".to_string(),
            ));
        }
        let name = types::prewarm_workload_name();
        let object = WorkloadObject {
            name: name.clone(),
            role: WorkloadRole::Prewarm,
            labels: types::base_workload_labels(WorkloadRole::Prewarm),
            created_at: Utc::now(),
            ready: self.workloads_start_ready.load(Ordering::SeqCst),
            address: Some(format!("{}.test:3000", name)),
        };
        self.state
            .lock()
            .unwrap()
            .workloads
            .insert(name, object.clone());
        Ok(object)
    }

    async fn claim_workload(
        &self,
        name: &str,
        session_id: &str,
    ) -> Result<WorkloadObject, ClusterError> {
        let mut state = self.state.lock().unwrap();
        let workload = state
            .workloads
            .get_mut(name)
            .ok_or_else(|| ClusterError::NotFound(format!("workload {}", name)))?;
        workload.role = WorkloadRole::Active;
        workload.labels.insert(
            types::ROLE_LABEL_KEY.to_string(),
            WorkloadRole::Active.as_label().to_string(),
        );
        workload
            .labels
            .insert(SESSION_LABEL_KEY.to_string(), session_id.to_string());
        Ok(workload.clone())
    }

    async fn create_endpoint(
        &self,
        session_id: &str,
        selector: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<EndpointObject, ClusterError> {
        if self.fail_endpoint_create.load(Ordering::SeqCst) {
            return Err(ClusterError::CreateFailed(
                "injected endpoint failure".to_string(),
            ));
        }
        let name = types::session_endpoint_name(session_id);
        let mut state = self.state.lock().unwrap();
        if state.endpoints.contains_key(&name) {
            return Err(ClusterError::Conflict(format!(
                "endpoint {} already exists",
                name
            )));
        }
        let target = if let Some(workload_name) = selector.get(WORKLOAD_NAME_LABEL_KEY) {
            state.workloads.get(workload_name)
        } else if let Some(session) = selector.get(SESSION_LABEL_KEY) {
            state
                .workloads
                .values()
                .find(|w| w.session_id() == Some(session.as_str()))
        } else {
            None
        };
        let address = target
            .and_then(|w| w.address.clone())
            .ok_or_else(|| {
                ClusterError::CreateFailed(format!(
                    "no workload matches selector for endpoint {}",
                    name
                ))
            })?;

        let mut merged = annotations.clone();
        merged
            .entry(SESSION_ID_ANNOTATION.to_string())
            .or_insert_with(|| session_id.to_string());
        let mut labels = BTreeMap::new();
        labels.insert(
            types::APP_LABEL_KEY.to_string(),
            types::APP_LABEL_VALUE.to_string(),
        );
        let object = EndpointObject {
            name: name.clone(),
            labels,
            annotations: merged,
            address,
            created_at: Utc::now(),
        };
        state.endpoints.insert(name, object.clone());
        Ok(object)
    }

    async fn delete_workload(&self, name: &str) -> Result<(), ClusterError> {
        self.state.lock().unwrap().workloads.remove(name);
        Ok(())
    }

    async fn delete_endpoint(&self, name: &str) -> Result<(), ClusterError> {
        self.state.lock().unwrap().endpoints.remove(name);
        Ok(())
    }

    async fn list_workloads(
        &self,
        role: WorkloadRole,
    ) -> Result<Vec<WorkloadObject>, ClusterError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ClusterError::ApiError("injected listing failure".to_string()));
        }
        let state = self.state.lock().unwrap();
        let mut result: Vec<WorkloadObject> = state
            .workloads
            .values()
            .filter(|w| types::is_workload_with_role(w, role))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointObject>, ClusterError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ClusterError::ApiError("injected listing failure".to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .endpoints
            .values()
            .filter(|e| types::is_session_endpoint(e))
            .cloned()
            .collect())
    }

    async fn is_ready(&self, workload: &WorkloadObject) -> Result<bool, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .workloads
            .get(&workload.name)
            .map(|w| w.ready)
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<(), ClusterError> {
        Ok(())
    }
}
