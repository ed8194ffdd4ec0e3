//! Task health aggregation
//!
//! Every running task of a service exposes a `/health` document. The
//! collaborator polls each task and hands the outcomes here; this module
//! turns them into the metric data published for the service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::client::{ClientError, EcsClient, ServiceDescription, Task};

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("got {0} matching services")]
    ServiceCount(usize),

    #[error("got {0} load balancers")]
    LoadBalancerCount(usize),

    #[error("got {count} containers in task {task}")]
    ContainerCount { task: String, count: usize },

    #[error("got {count} network interfaces in task {task}")]
    InterfaceCount { task: String, count: usize },

    #[error("service client error: {0}")]
    Client(#[from] ClientError),
}

/// Queue statistics reported by a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskStats {
    #[serde(default)]
    pub oldest_not_done_added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub num_queued: u64,
    #[serde(default)]
    pub num_in_progress: u64,
}

/// Issue-tracker sync errors reported by a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JiraIssueErrors {
    #[serde(default)]
    pub num_errors: u64,
    #[serde(default)]
    pub oldest_num_retries: u64,
    #[serde(default)]
    pub oldest_added_at: Option<DateTime<Utc>>,
}

/// A task's `/health` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthReport {
    /// Dependency name to reachability; values may be nested objects
    #[serde(default)]
    pub can_connect: BTreeMap<String, Value>,
    /// Absent when the task omits the section or sends it empty
    #[serde(default, deserialize_with = "non_empty_section")]
    pub task_stats: Option<TaskStats>,
    #[serde(default, deserialize_with = "non_empty_section")]
    pub jira_issue_errors: Option<JiraIssueErrors>,
}

/// Read an optional section, treating `null` and `{}` alike as missing.
fn non_empty_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Map<String, Value>>::deserialize(deserializer)? {
        Some(section) if !section.is_empty() => serde_json::from_value(Value::Object(section))
            .map(Some)
            .map_err(D::Error::custom),
        _ => Ok(None),
    }
}

/// Address to poll for one running task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub task_arn: String,
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.address, self.port)
    }
}

/// Result of polling one endpoint
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Healthy(HealthReport),
    Failed { endpoint: Endpoint, error: String },
}

/// Polls a task's health document
pub trait HealthProbe {
    fn poll(&self, endpoint: &Endpoint) -> Result<HealthReport, String>;
}

/// One metric data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Container port of the service's single load balancer
pub fn container_port(services: &[ServiceDescription]) -> Result<u16, HealthError> {
    let [service] = services else {
        return Err(HealthError::ServiceCount(services.len()));
    };
    match service.load_balancers.as_slice() {
        [lb] => Ok(lb.container_port),
        other => Err(HealthError::LoadBalancerCount(other.len())),
    }
}

/// Endpoint of a task, or `None` for a task that is not running.
pub fn resolve_endpoint(task: &Task, port: u16) -> Result<Option<Endpoint>, HealthError> {
    if !task.is_running() {
        return Ok(None);
    }
    let [container] = task.containers.as_slice() else {
        return Err(HealthError::ContainerCount {
            task: task.task_arn.clone(),
            count: task.containers.len(),
        });
    };
    let [interface] = container.network_interfaces.as_slice() else {
        return Err(HealthError::InterfaceCount {
            task: task.task_arn.clone(),
            count: container.network_interfaces.len(),
        });
    };
    Ok(Some(Endpoint {
        task_arn: task.task_arn.clone(),
        address: interface.private_ipv4_address.clone(),
        port,
    }))
}

/// JSON truthiness: false, null, zero, and empty strings, arrays or objects
/// are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn age_seconds(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 1000.0
}

/// Service-wide health metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub num_healthy: u64,
    /// Healthy tasks that can reach each dependency
    pub connect_counts: BTreeMap<String, u64>,
    pub oldest_task_age_seconds: f64,
    pub num_queued: u64,
    pub num_in_progress: u64,
    pub jira_num_errors: u64,
    pub jira_num_retries: u64,
    pub jira_oldest_age_seconds: f64,
}

impl HealthSummary {
    /// Fold poll outcomes into a summary.
    ///
    /// Failed polls only reduce the healthy count. Queue and issue-tracker
    /// stats describe shared state, so every task reports the same values;
    /// the last report carrying them is used.
    pub fn aggregate<'a, I>(outcomes: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a PollOutcome>,
    {
        let mut summary = Self::default();

        for outcome in outcomes {
            let report = match outcome {
                PollOutcome::Healthy(report) => report,
                PollOutcome::Failed { endpoint, error } => {
                    tracing::warn!(url = %endpoint.health_url(), error = %error, "health poll failed");
                    continue;
                }
            };

            summary.num_healthy += 1;
            for (name, value) in &report.can_connect {
                if is_truthy(value) {
                    *summary.connect_counts.entry(name.clone()).or_insert(0) += 1;
                }
            }

            if let Some(stats) = &report.task_stats {
                if let Some(oldest) = stats.oldest_not_done_added_at {
                    summary.oldest_task_age_seconds = age_seconds(now, oldest);
                }
                summary.num_queued = stats.num_queued;
                summary.num_in_progress = stats.num_in_progress;
            }

            if let Some(jira) = &report.jira_issue_errors {
                summary.jira_num_errors = jira.num_errors;
                if jira.num_errors > 0 {
                    if let Some(oldest) = jira.oldest_added_at {
                        summary.jira_oldest_age_seconds = age_seconds(now, oldest);
                    }
                    summary.jira_num_retries = jira.oldest_num_retries;
                }
            }
        }

        summary
    }

    /// Metric data in publication order
    pub fn metrics(&self, now: DateTime<Utc>) -> Vec<MetricDatum> {
        let datum = |name: &str, value: f64| MetricDatum {
            name: name.to_string(),
            value,
            timestamp: now,
        };

        let mut metrics = vec![
            datum("OldestTaskAge", self.oldest_task_age_seconds),
            datum(
                "NumUnfinishedTasks",
                (self.num_queued + self.num_in_progress) as f64,
            ),
            datum("Backends.Healthy", self.num_healthy as f64),
            datum("JiraOldestAge", self.jira_oldest_age_seconds),
            datum("JiraNumRetries", self.jira_num_retries as f64),
            datum("JiraNumErrors", self.jira_num_errors as f64),
        ];
        metrics.extend(
            self.connect_counts
                .iter()
                .map(|(name, count)| datum(&format!("Backends.Connect.{}", name), *count as f64)),
        );
        metrics
    }
}

/// Health check job for one service
pub struct HealthChecker<C, P> {
    client: C,
    probe: P,
    cluster: String,
    service: String,
}

impl<C: EcsClient, P: HealthProbe> HealthChecker<C, P> {
    pub fn new(client: C, probe: P, cluster: &str, service: &str) -> Self {
        Self {
            client,
            probe,
            cluster: cluster.to_string(),
            service: service.to_string(),
        }
    }

    /// Poll every running task and summarise.
    pub fn run(&self, now: DateTime<Utc>) -> Result<HealthSummary, HealthError> {
        let services = self
            .client
            .describe_services(&self.cluster, &[self.service.as_str()])?;
        let port = container_port(&services)?;

        let mut outcomes = Vec::new();
        for task in self.client.list_running_tasks(&self.cluster, &self.service)? {
            let Some(endpoint) = resolve_endpoint(&task, port)? else {
                continue;
            };
            let outcome = match self.probe.poll(&endpoint) {
                Ok(report) => PollOutcome::Healthy(report),
                Err(error) => PollOutcome::Failed { endpoint, error },
            };
            outcomes.push(outcome);
        }

        let summary = HealthSummary::aggregate(&outcomes, now);
        tracing::info!(
            service = %self.service,
            polled = outcomes.len(),
            healthy = summary.num_healthy,
            "health check complete"
        );
        Ok(summary)
    }
}
