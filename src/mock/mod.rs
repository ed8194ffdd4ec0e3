//! In-memory collaborators
//!
//! Stand-ins for the snapshot store, the container service and the task
//! health endpoint, with failure injection for exercising error paths.
//! Handles are cheap to clone and share state, so a test can hand one to a
//! job and inspect the result through another.

mod failure;
mod services;
mod snapshots;

pub use failure::{FailureConfig, FailureInjector, MockOperation};
pub use services::{MockEcsClient, MockHealthProbe};
pub use snapshots::MockSnapshotStore;
