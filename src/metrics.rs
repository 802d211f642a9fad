//! Prometheus metrics registry and metric name constants.

use log::warn;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const SESSIONS_CREATED_TOTAL: &str = "ruche_sessions_created_total";
pub const SESSIONS_LIVE: &str = "ruche_sessions_live";
pub const SESSION_PROVISION_SECONDS: &str = "ruche_session_provision_seconds";
pub const ORPHANS_RECLAIMED_TOTAL: &str = "ruche_orphans_reclaimed_total";
pub const STALE_RECLAIMED_TOTAL: &str = "ruche_stale_reclaimed_total";
pub const PROXY_REQUESTS_TOTAL: &str = "ruche_proxy_requests_total";

/// Installs the global Prometheus recorder and returns the render handle.
///
/// A recorder can only be installed once per process. If one is already
/// in place (as happens when several controllers share a test binary) a
/// detached handle is returned instead so `/metrics` still renders.
pub fn install_recorder() -> PrometheusHandle {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Prometheus recorder already installed: {}", e);
            PrometheusBuilder::new().build_recorder().handle()
        }
    }
}
