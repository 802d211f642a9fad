//! HTTP API: session CRUD, health, metrics, and the forwarding proxy.

pub mod types;
pub mod web_server;

pub use web_server::WebServer;
