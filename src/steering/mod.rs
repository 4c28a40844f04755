//! Multi-task message steering: per-task filter and transform pipeline,
//! retrying delivery, rate limiting, and lifecycle management over one
//! shared protocol session.

pub mod dedup;
pub mod delivery;
pub mod filter;
pub mod limiter;
pub mod registry;
pub mod stats;
pub mod store;
mod task;
pub mod transform;
pub mod types;

pub use registry::{RegistryOptions, TaskOverview, TaskRegistry, TaskStatus};
pub use stats::TaskStats;
pub use store::TaskStore;
pub use types::{ForwardMode, TaskConfig, TaskPatch};
