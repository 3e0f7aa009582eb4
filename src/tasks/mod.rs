//! Send task controller.
//!
//! Runs any number of independent send tasks, each pushing an ordered
//! list of messages through its own driver, and lets callers pause,
//! resume, stop, or re-pace them while they run.

pub mod control;
mod lifecycle;
mod registry;
mod runner;
mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use lifecycle::{DriverLease, ResourceManager};
pub use registry::{TaskError, TaskRegistry, TaskRequest};
pub use runner::JobRunner;
pub use state::{TaskId, TaskInfo, TaskState, TaskStatus};
