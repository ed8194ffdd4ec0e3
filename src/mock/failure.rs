//! Failure injection for the in-memory collaborators

use std::collections::HashMap;

use crate::client::ClientError;

/// Collaborator calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    DescribeSnapshots,
    CopySnapshot,
    DeleteSnapshot,
    DescribeServices,
    ListRunningTasks,
    ForceNewDeployment,
}

impl MockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DescribeSnapshots => "describe_snapshots",
            Self::CopySnapshot => "copy_snapshot",
            Self::DeleteSnapshot => "delete_snapshot",
            Self::DescribeServices => "describe_services",
            Self::ListRunningTasks => "list_running_tasks",
            Self::ForceNewDeployment => "force_new_deployment",
        }
    }
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error message to return
    pub message: String,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-operation failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<MockOperation, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<MockOperation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, op: MockOperation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    pub fn inject_error(&mut self, op: MockOperation, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(message));
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_op(&mut self, op: MockOperation) {
        self.configs.remove(&op);
        self.call_counts.remove(&op);
    }

    /// Record a call to `op` and return the error it should fail with, if any.
    pub fn check(&mut self, op: MockOperation) -> Result<(), ClientError> {
        let Some(config) = self.configs.get(&op) else {
            return Ok(());
        };
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return Ok(());
            }
        }
        Err(ClientError::new(op.as_str(), config.message.clone()))
    }
}
