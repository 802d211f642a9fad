//! Session model and lifecycle orchestration.
//!
//! Submodules:
//! - `session`: the persisted session record and its status machine.
//! - `lifecycle`: the create/delete controller driving cluster resources.
//! - `prewarm`: optional spare-workload pool maintenance.

pub mod lifecycle;
pub mod prewarm;
pub mod session;

pub use lifecycle::{DeleteOutcome, SessionLifecycle};
pub use session::{SessionRecord, SessionStatus};
