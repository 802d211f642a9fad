//! Cluster resource management.
//!
//! One workload (the browser process) and one routing endpoint exist per
//! live session. This module exposes the abstract create/read/delete
//! capability the orchestrator needs ([`ClusterBackend`]) together with the
//! shipped process-backed implementation ([`ProcessCluster`]) that runs
//! workloads as local child processes on ephemeral ports.

pub mod backend;
#[cfg(test)]
pub mod fake_cluster;
pub mod process_cluster;
pub mod types;

pub use backend::ClusterBackend;
pub use process_cluster::ProcessCluster;
pub use types::{EndpointObject, WorkloadObject, WorkloadRole};
