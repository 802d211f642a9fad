use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use metrics::{counter, gauge, histogram};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::cluster::types::{
    HAND_OFF_ANNOTATION, SESSION_LABEL_KEY, TARGET_WORKLOAD_ANNOTATION, WORKLOAD_NAME_LABEL_KEY,
};
use crate::cluster::{ClusterBackend, EndpointObject, WorkloadObject, WorkloadRole};
use crate::configuration::Config;
use crate::error_handling::StoreError;
use crate::metrics::{SESSIONS_CREATED_TOTAL, SESSIONS_LIVE, SESSION_PROVISION_SECONDS};
use crate::readiness::ReadinessProbe;
use crate::record_store::store_trait::RecordStore;
use crate::session_management::session::{SessionRecord, SessionStatus};

const ADMISSION_LOCK_KEY: &str = "admission:lock";
const ADMISSION_LOCK_TTL: Duration = Duration::from_secs(10);
const ADMISSION_LOCK_ATTEMPTS: u32 = 50;
const ADMISSION_LOCK_BACKOFF: Duration = Duration::from_millis(100);

/// Result of a best-effort delete. Individual step failures are joined
/// into `error` instead of aborting the remaining steps.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Drives a session from pending to live (or failed) and back out again.
///
/// Provisioning failures after the pending record is written are recorded
/// on the session itself; only store unavailability surfaces as an error,
/// since a session without a record could never be reclaimed.
pub struct SessionLifecycle {
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    waiter: Arc<dyn ReadinessProbe>,
    config: Config,
}

impl SessionLifecycle {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cluster: Arc<dyn ClusterBackend>,
        waiter: Arc<dyn ReadinessProbe>,
        config: Config,
    ) -> Self {
        SessionLifecycle {
            store,
            cluster,
            waiter,
            config,
        }
    }

    pub async fn create_session(
        &self,
        timeout: Option<u64>,
        options: Map<String, Value>,
    ) -> Result<SessionRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let timeout_seconds = self.config.effective_timeout(timeout);
        let started = Instant::now();

        // The pending record goes in first so a crash at any later point
        // leaves something the janitor can reconcile against.
        let mut record = SessionRecord::new_pending(id.clone(), timeout_seconds, options);
        self.store.save(&record).await?;
        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        info!("Created pending session: {}", id);

        // Fast-fail pre-check before anything is spawned. The binding
        // admission decision happens under the store lock at endpoint
        // creation time.
        let endpoints = match self.cluster.list_endpoints().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("Endpoint listing failed during admission for {}: {}", id, e);
                return self.fail_session(record, format!("Cluster unavailable: {}", e)).await;
            }
        };
        if endpoints.len() >= self.config.max_sessions {
            warn!(
                "Rejecting session {}: {} active sessions at limit {}",
                id,
                endpoints.len(),
                self.config.max_sessions
            );
            return self.fail_session(record, "Max sessions reached".to_string()).await;
        }

        // Prefer a ready prewarmed spare; fall back to a cold start.
        let (workload, hand_off) = match self.claim_prewarmed(&id).await {
            Some(workload) => (workload, "prewarm"),
            None => {
                match self.cluster.create_workload(&id, &record.options).await {
                    Ok(workload) => (workload, "cold"),
                    Err(e) => {
                        return self
                            .fail_session(record, format!("Failed to create workload: {}", e))
                            .await;
                    }
                }
            }
        };
        record.workload_name = Some(workload.name.clone());
        // A workload the store does not know about is unreclaimable, so a
        // store outage here tears the workload down before surfacing.
        if let Err(e) = self.store.save(&record).await {
            self.roll_back(&id, None, Some(&workload.name)).await;
            return Err(e);
        }

        let mut selector = BTreeMap::new();
        if hand_off == "prewarm" {
            selector.insert(WORKLOAD_NAME_LABEL_KEY.to_string(), workload.name.clone());
        } else {
            selector.insert(SESSION_LABEL_KEY.to_string(), id.clone());
        }
        let mut annotations = BTreeMap::new();
        annotations.insert(
            TARGET_WORKLOAD_ANNOTATION.to_string(),
            workload.name.clone(),
        );
        annotations.insert(HAND_OFF_ANNOTATION.to_string(), hand_off.to_string());

        let endpoint = match self.admit_and_create_endpoint(&id, &selector, &annotations).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(note)) => {
                self.roll_back(&id, None, Some(&workload.name)).await;
                return self.fail_session(record, note).await;
            }
            Err(e) => {
                self.roll_back(&id, None, Some(&workload.name)).await;
                return Err(e);
            }
        };
        record.endpoint_name = Some(endpoint.name.clone());
        record.endpoint_address = Some(endpoint.address.clone());
        if let Err(e) = self.store.save(&record).await {
            self.roll_back(&id, Some(&endpoint.name), Some(&workload.name))
                .await;
            return Err(e);
        }

        let readiness_timeout = Duration::from_secs(self.config.readiness_timeout_secs);
        if let Err(e) = self
            .waiter
            .wait_until_ready(&endpoint.address, readiness_timeout)
            .await
        {
            self.roll_back(&id, Some(&endpoint.name), Some(&workload.name))
                .await;
            return self
                .fail_session(record, format!("Session never became ready: {}", e))
                .await;
        }

        record.status = SessionStatus::Live;
        self.store.save(&record).await?;
        histogram!(SESSION_PROVISION_SECONDS).record(started.elapsed().as_secs_f64());
        self.refresh_live_gauge().await;
        info!(
            "Session {} is live at {} ({} start)",
            id, endpoint.address, hand_off
        );
        Ok(record)
    }

    /// Deletes a session's resources and record. Each step is attempted
    /// regardless of earlier failures, and deleting an unknown session
    /// succeeds.
    pub async fn delete_session(&self, id: &str) -> Result<DeleteOutcome, StoreError> {
        let record = match self.store.get(id).await {
            Ok(record) => Some(record),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e),
        };

        let mut errors: Vec<String> = Vec::new();
        if let Some(record) = &record {
            if let Some(endpoint_name) = &record.endpoint_name {
                if let Err(e) = self.cluster.delete_endpoint(endpoint_name).await {
                    errors.push(format!("endpoint: {}", e));
                }
            }
            if let Some(workload_name) = &record.workload_name {
                if let Err(e) = self.cluster.delete_workload(workload_name).await {
                    errors.push(format!("workload: {}", e));
                }
            }
        }

        if let Err(e) = self.store.delete(id).await {
            errors.push(format!("record: {}", e));
        }
        self.refresh_live_gauge().await;

        if errors.is_empty() {
            info!("Deleted session: {}", id);
            Ok(DeleteOutcome {
                success: true,
                error: None,
            })
        } else {
            warn!("Partial delete for session {}: {}", id, errors.join("; "));
            Ok(DeleteOutcome {
                success: false,
                error: Some(errors.join("; ")),
            })
        }
    }

    /// Recomputes the live-session gauge from the record store.
    pub async fn refresh_live_gauge(&self) {
        if let Ok(records) = self.store.list_all().await {
            let live = records.iter().filter(|r| r.is_live()).count();
            gauge!(SESSIONS_LIVE).set(live as f64);
        }
    }

    async fn claim_prewarmed(&self, session_id: &str) -> Option<WorkloadObject> {
        if self.config.prewarm_pool_size == 0 {
            return None;
        }
        let spares = match self.cluster.list_workloads(WorkloadRole::Prewarm).await {
            Ok(spares) => spares,
            Err(e) => {
                warn!("Prewarm listing failed, falling back to cold start: {}", e);
                return None;
            }
        };
        let spare = spares.into_iter().find(|w| w.ready)?;
        match self.cluster.claim_workload(&spare.name, session_id).await {
            Ok(claimed) => Some(claimed),
            Err(e) => {
                warn!(
                    "Failed to claim prewarmed workload {}, falling back to cold start: {}",
                    spare.name, e
                );
                None
            }
        }
    }

    /// Counts endpoints and creates the session's endpoint under the store
    /// lock, so two sessions racing for the last slot cannot both pass the
    /// count. The outer `Result` is store availability; the inner one is
    /// the admission verdict with a failure note for the record.
    async fn admit_and_create_endpoint(
        &self,
        id: &str,
        selector: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Result<EndpointObject, String>, StoreError> {
        let token = Uuid::new_v4().to_string();
        let mut locked = false;
        for _ in 0..ADMISSION_LOCK_ATTEMPTS {
            if self
                .store
                .acquire_lock(ADMISSION_LOCK_KEY, &token, ADMISSION_LOCK_TTL)
                .await?
            {
                locked = true;
                break;
            }
            tokio::time::sleep(ADMISSION_LOCK_BACKOFF).await;
        }
        if !locked {
            return Ok(Err("Admission lock contention".to_string()));
        }

        let verdict = match self.cluster.list_endpoints().await {
            Ok(endpoints) if endpoints.len() >= self.config.max_sessions => {
                Err("Max sessions reached".to_string())
            }
            Ok(_) => match self.cluster.create_endpoint(id, selector, annotations).await {
                Ok(endpoint) => Ok(endpoint),
                Err(e) => Err(format!("Failed to create endpoint: {}", e)),
            },
            Err(e) => Err(format!("Cluster unavailable: {}", e)),
        };

        // Best effort; the TTL reclaims an unreleased lock.
        if let Err(e) = self.store.release_lock(ADMISSION_LOCK_KEY, &token).await {
            warn!("Failed to release admission lock: {}", e);
        }
        Ok(verdict)
    }

    async fn fail_session(
        &self,
        mut record: SessionRecord,
        note: String,
    ) -> Result<SessionRecord, StoreError> {
        record.fail(note);
        self.store.save(&record).await?;
        Ok(record)
    }

    /// Best-effort teardown of partially provisioned resources, endpoint
    /// first so routing disappears before the workload does.
    async fn roll_back(&self, id: &str, endpoint: Option<&str>, workload: Option<&str>) {
        if let Some(name) = endpoint {
            if let Err(e) = self.cluster.delete_endpoint(name).await {
                warn!("Rollback of endpoint {} for session {} failed: {}", name, id, e);
            }
        }
        if let Some(name) = workload {
            if let Err(e) = self.cluster.delete_workload(name).await {
                warn!("Rollback of workload {} for session {} failed: {}", name, id, e);
            }
        }
    }
}
