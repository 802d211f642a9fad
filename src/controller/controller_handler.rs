use std::sync::Arc;
use std::time::Duration;

use log::info;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::cluster::{ClusterBackend, ProcessCluster};
use crate::configuration::Config;
use crate::error_handling::ControllerError;
use crate::janitor::Janitor;
use crate::metrics;
use crate::readiness::ReadinessWaiter;
use crate::record_store::database_store::DatabaseStore;
use crate::record_store::memory_store::MemoryStore;
use crate::record_store::store_trait::RecordStore;
use crate::session_management::prewarm::PrewarmPool;
use crate::session_management::SessionLifecycle;
use crate::web_interface::WebServer;

/// Wires the record store, cluster backend, lifecycle, janitor, and web
/// server together and keeps the background tasks running.
pub struct Controller {
    config: Config,
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    lifecycle: Arc<SessionLifecycle>,
    janitor: Arc<Janitor>,
    metrics_handle: PrometheusHandle,
}

impl Controller {
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing controller");
        config.validate()?;

        let store: Arc<dyn RecordStore> = match &config.store_path {
            Some(path) => {
                info!("Using persistent record store at {:?}", path);
                Arc::new(DatabaseStore::new_file(path).await?)
            }
            None => {
                info!("Using in-memory record store");
                Arc::new(MemoryStore::new())
            }
        };
        store.ping().await?;

        let cluster: Arc<dyn ClusterBackend> = Arc::new(ProcessCluster::new(&config));
        let waiter = Arc::new(ReadinessWaiter::new(Duration::from_secs(
            config.readiness_poll_secs,
        )));
        let lifecycle = Arc::new(SessionLifecycle::new(
            store.clone(),
            cluster.clone(),
            waiter,
            config.clone(),
        ));
        let janitor = Arc::new(Janitor::new(
            store.clone(),
            cluster.clone(),
            config.janitor_interval_secs,
            config.stale_workload_secs,
        ));
        let metrics_handle = metrics::install_recorder();

        info!("Controller initialized");
        Ok(Controller {
            config,
            store,
            cluster,
            lifecycle,
            janitor,
            metrics_handle,
        })
    }

    /// Spawns the background tasks and serves the API until the process
    /// is stopped.
    pub async fn run(&self) -> Result<(), ControllerError> {
        info!("Starting controller tasks");

        tokio::spawn(self.janitor.clone().run());

        if self.config.prewarm_pool_size > 0 {
            let pool = Arc::new(PrewarmPool::new(
                self.store.clone(),
                self.cluster.clone(),
                self.config.prewarm_pool_size,
                self.config.prewarm_interval_secs,
            ));
            tokio::spawn(pool.run());
        }

        let server = WebServer::new(
            self.store.clone(),
            self.cluster.clone(),
            self.lifecycle.clone(),
            self.config.clone(),
            self.metrics_handle.clone(),
        );
        server.start().await?;
        Ok(())
    }
}
