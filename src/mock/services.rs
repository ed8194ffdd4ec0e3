//! In-memory container service and health endpoint

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::client::{
    ClientError, Deployment, EcsClient, ServiceDescription, Task, PRIMARY_DEPLOYMENT,
};
use crate::health::{Endpoint, HealthProbe, HealthReport};

use super::failure::{FailureConfig, FailureInjector, MockOperation};

#[derive(Debug, Default)]
struct ClusterState {
    /// Services by cluster
    services: HashMap<String, Vec<ServiceDescription>>,
    /// Tasks by (cluster, service)
    tasks: HashMap<(String, String), Vec<Task>>,
    /// Forced deployments as (cluster, service)
    redeploys: Vec<(String, String)>,
    deploy_counter: u64,
}

/// Container service backed by maps
#[derive(Debug, Clone)]
pub struct MockEcsClient {
    state: Arc<Mutex<ClusterState>>,
    failures: Arc<Mutex<FailureInjector>>,
    /// Creation time given to deployments started by a forced redeploy
    deploy_time: DateTime<Utc>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockEcsClient {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            failures: Arc::default(),
            deploy_time: Utc::now(),
        }
    }
}

impl MockEcsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deploy_time(mut self, deploy_time: DateTime<Utc>) -> Self {
        self.deploy_time = deploy_time;
        self
    }

    pub fn add_service(&self, cluster: &str, service: ServiceDescription) {
        lock(&self.state)
            .services
            .entry(cluster.to_string())
            .or_default()
            .push(service);
    }

    pub fn add_task(&self, cluster: &str, service: &str, task: Task) {
        lock(&self.state)
            .tasks
            .entry((cluster.to_string(), service.to_string()))
            .or_default()
            .push(task);
    }

    pub fn inject(&self, op: MockOperation, config: FailureConfig) {
        lock(&self.failures).inject(op, config);
    }

    pub fn inject_error(&self, op: MockOperation, message: impl Into<String>) {
        lock(&self.failures).inject_error(op, message);
    }

    pub fn redeploys(&self) -> Vec<(String, String)> {
        lock(&self.state).redeploys.clone()
    }
}

impl EcsClient for MockEcsClient {
    fn describe_services(
        &self,
        cluster: &str,
        services: &[&str],
    ) -> Result<Vec<ServiceDescription>, ClientError> {
        lock(&self.failures).check(MockOperation::DescribeServices)?;
        Ok(lock(&self.state)
            .services
            .get(cluster)
            .map(|all| {
                all.iter()
                    .filter(|s| services.contains(&s.name.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_running_tasks(&self, cluster: &str, service: &str) -> Result<Vec<Task>, ClientError> {
        lock(&self.failures).check(MockOperation::ListRunningTasks)?;
        Ok(lock(&self.state)
            .tasks
            .get(&(cluster.to_string(), service.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn force_new_deployment(&mut self, cluster: &str, service: &str) -> Result<(), ClientError> {
        lock(&self.failures).check(MockOperation::ForceNewDeployment)?;
        let mut state = lock(&self.state);

        state.deploy_counter += 1;
        let id = format!("ecs-svc/{:08x}", state.deploy_counter);
        let deploy_time = self.deploy_time;

        let target = state
            .services
            .get_mut(cluster)
            .and_then(|all| all.iter_mut().find(|s| s.name == service))
            .ok_or_else(|| {
                ClientError::new(
                    MockOperation::ForceNewDeployment.as_str(),
                    format!("service '{}' not found in cluster '{}'", service, cluster),
                )
            })?;

        for deployment in &mut target.deployments {
            if deployment.status == PRIMARY_DEPLOYMENT {
                deployment.status = "ACTIVE".to_string();
            }
        }
        target.deployments.push(Deployment {
            id,
            status: PRIMARY_DEPLOYMENT.to_string(),
            created_at: deploy_time,
        });

        state
            .redeploys
            .push((cluster.to_string(), service.to_string()));
        Ok(())
    }
}

/// Health endpoint answering from canned reports keyed by address
#[derive(Debug, Clone, Default)]
pub struct MockHealthProbe {
    responses: HashMap<String, Result<HealthReport, String>>,
}

impl MockHealthProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, address: &str, report: HealthReport) -> Self {
        self.responses.insert(address.to_string(), Ok(report));
        self
    }

    pub fn fail(mut self, address: &str, error: &str) -> Self {
        self.responses.insert(address.to_string(), Err(error.to_string()));
        self
    }
}

impl HealthProbe for MockHealthProbe {
    fn poll(&self, endpoint: &Endpoint) -> Result<HealthReport, String> {
        self.responses
            .get(&endpoint.address)
            .cloned()
            .unwrap_or_else(|| Err(format!("no route to {}", endpoint.health_url())))
    }
}
