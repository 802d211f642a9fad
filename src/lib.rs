pub mod cluster;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod janitor;
pub mod metrics;
pub mod readiness;
pub mod record_store;
pub mod session_management;
pub mod web_interface;
