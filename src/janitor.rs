//! Background reconciliation between the record store and the cluster.
//!
//! Records carry TTLs and vanish on their own; the cluster-side workloads
//! and endpoints do not. The janitor walks the cluster at a fixed
//! interval and reclaims resources whose session record has expired, plus
//! prewarmed spares that never became ready.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use metrics::counter;
use tokio::sync::Mutex;

use crate::cluster::{types, ClusterBackend, WorkloadRole};
use crate::metrics::{ORPHANS_RECLAIMED_TOTAL, STALE_RECLAIMED_TOTAL};
use crate::record_store::store_trait::RecordStore;

pub struct Janitor {
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    interval: Duration,
    stale_after: ChronoDuration,
    /// Endpoints seen without a record on the previous sweep. An orphan
    /// is only reclaimed on the second consecutive sighting, so a record
    /// written moments ago that the cluster listing has not caught up
    /// with is never torn down.
    suspects: Mutex<HashSet<String>>,
}

impl Janitor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cluster: Arc<dyn ClusterBackend>,
        interval_secs: u64,
        stale_secs: u64,
    ) -> Self {
        Janitor {
            store,
            cluster,
            interval: Duration::from_secs(interval_secs),
            stale_after: ChronoDuration::seconds(stale_secs as i64),
            suspects: Mutex::new(HashSet::new()),
        }
    }

    /// Sweeps immediately, then at the configured interval. The first
    /// sweep picks up resources left behind by a previous crash.
    pub async fn run(self: Arc<Self>) {
        info!("Janitor running every {:?}", self.interval);
        loop {
            self.sweep().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn sweep(&self) {
        self.sweep_orphans().await;
        self.sweep_stale_prewarms().await;
    }

    async fn sweep_orphans(&self) {
        let endpoints = match self.cluster.list_endpoints().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("Orphan sweep skipped, endpoint listing failed: {}", e);
                return;
            }
        };

        let mut suspects = self.suspects.lock().await;
        let mut next_suspects = HashSet::new();

        for endpoint in endpoints {
            let session_id = match endpoint.session_id() {
                Some(id) => id.to_string(),
                None => {
                    debug!("Endpoint {} carries no session annotation", endpoint.name);
                    continue;
                }
            };

            match self.store.exists(&session_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    // A flaky store must never look like an expired
                    // session, skip this endpoint entirely.
                    warn!(
                        "Record check failed for session {}, skipping endpoint {}: {}",
                        session_id, endpoint.name, e
                    );
                    continue;
                }
            }

            if !suspects.contains(&endpoint.name) {
                debug!(
                    "Endpoint {} has no record, marking for the next sweep",
                    endpoint.name
                );
                next_suspects.insert(endpoint.name.clone());
                continue;
            }

            info!(
                "Reclaiming orphaned resources for expired session: {}",
                session_id
            );
            if let Err(e) = self.cluster.delete_endpoint(&endpoint.name).await {
                warn!("Failed to delete orphaned endpoint {}: {}", endpoint.name, e);
            }
            let workload_name = endpoint
                .target_workload()
                .map(str::to_string)
                .unwrap_or_else(|| types::session_workload_name(&session_id));
            if let Err(e) = self.cluster.delete_workload(&workload_name).await {
                warn!("Failed to delete orphaned workload {}: {}", workload_name, e);
            }
            counter!(ORPHANS_RECLAIMED_TOTAL).increment(1);
        }

        *suspects = next_suspects;
    }

    /// Deletes prewarmed spares that are past the stale threshold and
    /// still not ready. A spare that old is wedged and will never be
    /// handed off.
    async fn sweep_stale_prewarms(&self) {
        let spares = match self.cluster.list_workloads(WorkloadRole::Prewarm).await {
            Ok(spares) => spares,
            Err(e) => {
                warn!("Stale sweep skipped, workload listing failed: {}", e);
                return;
            }
        };

        let now = Utc::now();
        for workload in spares {
            if workload.ready || now - workload.created_at <= self.stale_after {
                continue;
            }
            info!("Reclaiming stale prewarmed workload: {}", workload.name);
            if let Err(e) = self.cluster.delete_workload(&workload.name).await {
                warn!("Failed to delete stale workload {}: {}", workload.name, e);
            }
            counter!(STALE_RECLAIMED_TOTAL).increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    use serde_json::Map;

    use crate::cluster::fake_cluster::FakeCluster;
    use crate::cluster::types::{SESSION_ID_ANNOTATION, TARGET_WORKLOAD_ANNOTATION};
    use crate::record_store::memory_store::MemoryStore;
    use crate::session_management::session::SessionRecord;

    fn janitor(store: Arc<MemoryStore>, cluster: Arc<FakeCluster>) -> Janitor {
        Janitor::new(store, cluster, 15, 600)
    }

    fn orphan_annotations(session_id: &str, workload: Option<&str>) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        annotations.insert(SESSION_ID_ANNOTATION.to_string(), session_id.to_string());
        if let Some(name) = workload {
            annotations.insert(TARGET_WORKLOAD_ANNOTATION.to_string(), name.to_string());
        }
        annotations
    }

    #[tokio::test]
    async fn orphan_is_reclaimed_on_the_second_sweep() {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_workload(
            "browser-session-gone",
            WorkloadRole::Active,
            Some("gone"),
            Utc::now(),
            true,
        );
        cluster.insert_endpoint(
            "browser-session-gone",
            orphan_annotations("gone", Some("browser-session-gone")),
        );

        let janitor = janitor(store, cluster.clone());

        // First sighting only marks the endpoint.
        janitor.sweep().await;
        assert_eq!(cluster.endpoint_names().len(), 1);
        assert_eq!(cluster.workload_names().len(), 1);

        // Second sighting reclaims endpoint and workload.
        janitor.sweep().await;
        assert!(cluster.endpoint_names().is_empty());
        assert!(cluster.workload_names().is_empty());
    }

    #[tokio::test]
    async fn endpoint_with_a_live_record_is_left_alone() {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        let record = SessionRecord::new_pending("alive".to_string(), 1800, Map::new());
        store.save(&record).await.unwrap();
        cluster.insert_endpoint("browser-session-alive", orphan_annotations("alive", None));

        let janitor = janitor(store, cluster.clone());
        janitor.sweep().await;
        janitor.sweep().await;
        assert_eq!(cluster.endpoint_names().len(), 1);
    }

    #[tokio::test]
    async fn fallback_workload_name_is_derived_from_the_session_id() {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_workload(
            "browser-session-noann",
            WorkloadRole::Active,
            Some("noann"),
            Utc::now(),
            true,
        );
        // Endpoint annotated with the session but not the workload.
        cluster.insert_endpoint("browser-session-noann", orphan_annotations("noann", None));

        let janitor = janitor(store, cluster.clone());
        janitor.sweep().await;
        janitor.sweep().await;
        assert!(cluster.workload_names().is_empty());
    }

    #[tokio::test]
    async fn listing_failures_skip_the_sweep_without_reclaiming() {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_endpoint("browser-session-x", orphan_annotations("x", None));

        let janitor = janitor(store.clone(), cluster.clone());
        janitor.sweep().await;

        cluster.fail_listing.store(true, Ordering::SeqCst);
        janitor.sweep().await;
        cluster.fail_listing.store(false, Ordering::SeqCst);
        assert_eq!(cluster.endpoint_names().len(), 1);
    }

    #[tokio::test]
    async fn stale_unready_prewarm_is_deleted_ready_one_survives() {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        let old = Utc::now() - ChronoDuration::seconds(700);
        cluster.insert_workload("browser-prewarm-wedged", WorkloadRole::Prewarm, None, old, false);
        cluster.insert_workload("browser-prewarm-ok", WorkloadRole::Prewarm, None, old, true);
        cluster.insert_workload(
            "browser-prewarm-young",
            WorkloadRole::Prewarm,
            None,
            Utc::now(),
            false,
        );

        janitor(store, cluster.clone()).sweep().await;

        let names = cluster.workload_names();
        assert!(!names.contains(&"browser-prewarm-wedged".to_string()));
        assert!(names.contains(&"browser-prewarm-ok".to_string()));
        assert!(names.contains(&"browser-prewarm-young".to_string()));
    }
}
