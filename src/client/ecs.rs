//! Container service interface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClientError;

/// Deployment status of the deployment currently serving traffic
pub const PRIMARY_DEPLOYMENT: &str = "PRIMARY";

/// Task status of a task that should answer health checks
pub const RUNNING_STATUS: &str = "RUNNING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub name: String,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub private_ipv4_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_arn: String,
    pub last_status: String,
    #[serde(default)]
    pub containers: Vec<Container>,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.last_status == RUNNING_STATUS
    }
}

/// Service description, task listing and redeploy
pub trait EcsClient {
    fn describe_services(
        &self,
        cluster: &str,
        services: &[&str],
    ) -> Result<Vec<ServiceDescription>, ClientError>;

    /// Tasks of a service whose desired status is running
    fn list_running_tasks(&self, cluster: &str, service: &str) -> Result<Vec<Task>, ClientError>;

    fn force_new_deployment(&mut self, cluster: &str, service: &str) -> Result<(), ClientError>;
}
