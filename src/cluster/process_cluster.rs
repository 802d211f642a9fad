use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::cluster::backend::ClusterBackend;
use crate::cluster::types::{
    self, EndpointObject, WorkloadObject, WorkloadRole, SESSION_ID_ANNOTATION, SESSION_LABEL_KEY,
    WORKLOAD_NAME_LABEL_KEY,
};
use crate::configuration::Config;
use crate::error_handling::ClusterError;

/// How long a readiness probe waits for a TCP accept before declaring the
/// workload not ready.
const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

struct ProcessWorkload {
    object: WorkloadObject,
    process: Option<Child>,
}

#[derive(Default)]
struct Registry {
    workloads: HashMap<String, ProcessWorkload>,
    endpoints: HashMap<String, EndpointObject>,
}

/// The shipped [`ClusterBackend`]: each workload is a local child process
/// started from the configured command line, listening on an ephemeral
/// 127.0.0.1 port. Endpoints are registry entries that pin the address of
/// the workload they front.
pub struct ProcessCluster {
    workload_command: String,
    base_path: String,
    memory_request: String,
    cpu_request: String,
    memory_limit: String,
    cpu_limit: String,
    registry: Arc<Mutex<Registry>>,
}

impl ProcessCluster {
    pub fn new(config: &Config) -> Self {
        info!(
            "Initializing process cluster backend (command: {:?})",
            config.workload_command
        );
        ProcessCluster {
            workload_command: config.workload_command.clone(),
            base_path: config.base_path.clone(),
            memory_request: config.memory_request.clone(),
            cpu_request: config.cpu_request.clone(),
            memory_limit: config.memory_limit.clone(),
            cpu_limit: config.cpu_limit.clone(),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Allocates an ephemeral host port on 127.0.0.1. The listener is
    /// dropped so the spawned workload can bind the port itself.
    fn allocate_ephemeral_port() -> Result<u16, ClusterError> {
        let listener = std::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .map_err(|e| {
                error!("Failed to allocate ephemeral port: {}", e);
                ClusterError::CreateFailed(format!("Failed to allocate ephemeral port: {}", e))
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| {
                error!("Failed to read local addr for ephemeral port: {}", e);
                ClusterError::CreateFailed(format!(
                    "Failed to read local addr for ephemeral port: {}",
                    e
                ))
            })?
            .port();
        drop(listener);
        debug!("Allocated ephemeral port: {}", port);
        Ok(port)
    }

    async fn spawn_workload(
        &self,
        name: &str,
        role: WorkloadRole,
        session_id: Option<&str>,
        options: &Map<String, Value>,
    ) -> Result<WorkloadObject, ClusterError> {
        let mut registry = self.registry.lock().await;
        if registry.workloads.contains_key(name) {
            return Err(ClusterError::Conflict(format!(
                "workload {} already exists",
                name
            )));
        }

        let port = Self::allocate_ephemeral_port()?;

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&self.workload_command)
            .env("PORT", port.to_string())
            .env("BASE_PATH", &self.base_path)
            .env("MEMORY_REQUEST", &self.memory_request)
            .env("CPU_REQUEST", &self.cpu_request)
            .env("MEMORY_LIMIT", &self.memory_limit)
            .env("CPU_LIMIT", &self.cpu_limit)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !options.is_empty() {
            let encoded = serde_json::to_string(options).map_err(|e| {
                ClusterError::CreateFailed(format!("Failed to encode session options: {}", e))
            })?;
            cmd.env("SESSION_OPTIONS", encoded);
        }

        debug!("Spawning workload {} on port {}", name, port);
        let mut process = cmd.spawn().map_err(|e| {
            error!("Failed to spawn workload {}: {}", name, e);
            ClusterError::CreateFailed(format!("Failed to spawn workload: {}", e))
        })?;

        // Drain child output into the service log.
        if let Some(stdout) = process.stdout.take() {
            let mut reader = BufReader::new(stdout).lines();
            let workload = name.to_string();
            tokio::spawn(async move {
                while let Ok(Some(line)) = reader.next_line().await {
                    debug!("[workload:{}][stdout] {}", workload, line);
                }
            });
        }
        if let Some(stderr) = process.stderr.take() {
            let mut reader = BufReader::new(stderr).lines();
            let workload = name.to_string();
            tokio::spawn(async move {
                while let Ok(Some(line)) = reader.next_line().await {
                    debug!("[workload:{}][stderr] {}", workload, line);
                }
            });
        }

        let mut labels = types::base_workload_labels(role);
        if let Some(id) = session_id {
            labels.insert(SESSION_LABEL_KEY.to_string(), id.to_string());
        }

        let object = WorkloadObject {
            name: name.to_string(),
            role,
            labels,
            created_at: Utc::now(),
            ready: false,
            address: Some(format!("127.0.0.1:{}", port)),
        };

        registry.workloads.insert(
            name.to_string(),
            ProcessWorkload {
                object: object.clone(),
                process: Some(process),
            },
        );

        info!("Spawned {} workload {} on port {}", role.as_label(), name, port);
        Ok(object)
    }

    /// TCP-level readiness probe against the workload's address.
    async fn probe(address: &str) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(address)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl ClusterBackend for ProcessCluster {
    async fn create_workload(
        &self,
        session_id: &str,
        options: &Map<String, Value>,
    ) -> Result<WorkloadObject, ClusterError> {
        let name = types::session_workload_name(session_id);
        self.spawn_workload(&name, WorkloadRole::Active, Some(session_id), options)
            .await
    }

    async fn create_prewarm_workload(&self) -> Result<WorkloadObject, ClusterError> {
        let name = types::prewarm_workload_name();
        self.spawn_workload(&name, WorkloadRole::Prewarm, None, &Map::new())
            .await
    }

    async fn claim_workload(
        &self,
        name: &str,
        session_id: &str,
    ) -> Result<WorkloadObject, ClusterError> {
        let mut registry = self.registry.lock().await;
        let workload = registry
            .workloads
            .get_mut(name)
            .ok_or_else(|| ClusterError::NotFound(format!("workload {}", name)))?;
        workload.object.role = WorkloadRole::Active;
        workload.object.labels.insert(
            types::ROLE_LABEL_KEY.to_string(),
            WorkloadRole::Active.as_label().to_string(),
        );
        workload
            .object
            .labels
            .insert(SESSION_LABEL_KEY.to_string(), session_id.to_string());
        info!("Claimed prewarmed workload {} for session {}", name, session_id);
        Ok(workload.object.clone())
    }

    async fn create_endpoint(
        &self,
        session_id: &str,
        selector: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<EndpointObject, ClusterError> {
        let name = types::session_endpoint_name(session_id);
        let mut registry = self.registry.lock().await;
        if registry.endpoints.contains_key(&name) {
            return Err(ClusterError::Conflict(format!(
                "endpoint {} already exists",
                name
            )));
        }

        // Resolve the workload the selector names, either explicitly or by
        // session label.
        let target = if let Some(workload_name) = selector.get(WORKLOAD_NAME_LABEL_KEY) {
            registry.workloads.get(workload_name)
        } else if let Some(session) = selector.get(SESSION_LABEL_KEY) {
            registry
                .workloads
                .values()
                .find(|w| w.object.session_id() == Some(session.as_str()))
        } else {
            None
        };

        let target = target.ok_or_else(|| {
            ClusterError::CreateFailed(format!("no workload matches selector for endpoint {}", name))
        })?;
        let address = target.object.address.clone().ok_or_else(|| {
            ClusterError::CreateFailed(format!(
                "workload {} has no address to route to",
                target.object.name
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

        let endpoint = EndpointObject {
            name: name.clone(),
            labels,
            annotations: merged,
            address,
            created_at: Utc::now(),
        };
        registry.endpoints.insert(name.clone(), endpoint.clone());

        info!("Created endpoint {} -> {}", name, endpoint.address);
        Ok(endpoint)
    }

    async fn delete_workload(&self, name: &str) -> Result<(), ClusterError> {
        let mut registry = self.registry.lock().await;
        match registry.workloads.remove(name) {
            Some(mut workload) => {
                if let Some(mut process) = workload.process.take() {
                    if let Err(e) = process.kill().await {
                        warn!("Failed to kill workload process {}: {}", name, e);
                    }
                }
                info!("Deleted workload: {}", name);
            }
            None => debug!("Workload {} already gone", name),
        }
        Ok(())
    }

    async fn delete_endpoint(&self, name: &str) -> Result<(), ClusterError> {
        let mut registry = self.registry.lock().await;
        if registry.endpoints.remove(name).is_some() {
            info!("Deleted endpoint: {}", name);
        } else {
            debug!("Endpoint {} already gone", name);
        }
        Ok(())
    }

    async fn list_workloads(
        &self,
        role: WorkloadRole,
    ) -> Result<Vec<WorkloadObject>, ClusterError> {
        let snapshot: Vec<WorkloadObject> = {
            let registry = self.registry.lock().await;
            registry
                .workloads
                .values()
                .map(|w| w.object.clone())
                .filter(|o| types::is_workload_with_role(o, role))
                .collect()
        };

        // Readiness is observed, not stored: probe outside the lock.
        let mut result = Vec::with_capacity(snapshot.len());
        for mut object in snapshot {
            object.ready = match &object.address {
                Some(address) => Self::probe(address).await,
                None => false,
            };
            result.push(object);
        }
        Ok(result)
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointObject>, ClusterError> {
        let registry = self.registry.lock().await;
        Ok(registry
            .endpoints
            .values()
            .filter(|e| types::is_session_endpoint(e))
            .cloned()
            .collect())
    }

    async fn is_ready(&self, workload: &WorkloadObject) -> Result<bool, ClusterError> {
        match &workload.address {
            Some(address) => Ok(Self::probe(address).await),
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), ClusterError> {
        Ok(())
    }
}
