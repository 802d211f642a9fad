//! Background sizing of the prewarmed spare pool.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::{ClusterBackend, WorkloadRole};
use crate::error_handling::ClusterError;
use crate::record_store::store_trait::RecordStore;

/// Advisory lock key shared by all replicas resizing the pool.
pub const PREWARM_LOCK_KEY: &str = "prewarm:lock";

/// Lock TTL. Long enough to cover a resize cycle, short enough that a
/// crashed holder does not stall the pool for long.
const PREWARM_LOCK_TTL: Duration = Duration::from_secs(30);

/// Keeps the number of unclaimed prewarmed workloads at the configured
/// size. Every cycle runs under a store-side advisory lock so only one
/// replica resizes at a time.
pub struct PrewarmPool {
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    pool_size: usize,
    interval: Duration,
}

impl PrewarmPool {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cluster: Arc<dyn ClusterBackend>,
        pool_size: usize,
        interval_secs: u64,
    ) -> Self {
        PrewarmPool {
            store,
            cluster,
            pool_size,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!(
            "Prewarm pool maintaining {} spares every {:?}",
            self.pool_size, self.interval
        );
        loop {
            self.resize().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One resize cycle. Skipped entirely when another replica holds the
    /// lock or the store cannot be reached.
    pub async fn resize(&self) {
        let token = Uuid::new_v4().to_string();
        match self
            .store
            .acquire_lock(PREWARM_LOCK_KEY, &token, PREWARM_LOCK_TTL)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Prewarm lock held elsewhere, skipping cycle");
                return;
            }
            Err(e) => {
                warn!("Prewarm lock unavailable, skipping cycle: {}", e);
                return;
            }
        }

        if let Err(e) = self.resize_locked().await {
            warn!("Prewarm resize cycle failed: {}", e);
        }

        if let Err(e) = self.store.release_lock(PREWARM_LOCK_KEY, &token).await {
            warn!("Failed to release prewarm lock: {}", e);
        }
    }

    async fn resize_locked(&self) -> Result<(), ClusterError> {
        let spares = self.cluster.list_workloads(WorkloadRole::Prewarm).await?;
        let current = spares.len();

        if current < self.pool_size {
            let deficit = self.pool_size - current;
            info!("Prewarm pool below target, creating {} spares", deficit);
            for _ in 0..deficit {
                match self.cluster.create_prewarm_workload().await {
                    Ok(workload) => debug!("Created prewarmed workload: {}", workload.name),
                    Err(e) => warn!("Failed to create prewarmed workload: {}", e),
                }
            }
        } else if current > self.pool_size {
            // Trim the oldest spares first, ready ones ahead of ones
            // still starting so a starting spare can still join the pool.
            let mut ordered = spares;
            ordered.sort_by(|a, b| {
                b.ready
                    .cmp(&a.ready)
                    .then(a.created_at.cmp(&b.created_at))
            });
            let excess = current - self.pool_size;
            info!("Prewarm pool above target, trimming {} spares", excess);
            for workload in ordered.into_iter().take(excess) {
                if let Err(e) = self.cluster.delete_workload(&workload.name).await {
                    warn!("Failed to trim prewarmed workload {}: {}", workload.name, e);
                }
            }
        }
        Ok(())
    }
}
