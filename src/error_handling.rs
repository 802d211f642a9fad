//! Error types shared across the orchestrator subsystems.

pub mod types;

pub use types::{
    ClusterError, ConfigError, ControllerError, ProvisionError, StoreError, WebError,
};
