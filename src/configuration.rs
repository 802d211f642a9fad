//! Runtime configuration for the orchestrator.
//!
//! Every knob is exposed as a long command-line flag and an environment
//! variable with a sensible default, so the binary can be configured
//! entirely from its environment in a deployment.

pub mod config;

pub use config::Config;
