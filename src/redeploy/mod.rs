//! Staleness-triggered service redeploy
//!
//! Forces a fresh deployment of a service once its primary deployment is
//! older than a configured age, so long-running tasks get recycled.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::{ClientError, EcsClient, ServiceDescription, PRIMARY_DEPLOYMENT};

#[derive(Debug, thiserror::Error)]
pub enum RedeployError {
    #[error("got {0} matching services")]
    ServiceCount(usize),

    #[error("{0} primary deployments")]
    PrimaryCount(usize),

    #[error("service client error: {0}")]
    Client(#[from] ClientError),
}

/// Outcome of a staleness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeployDecision {
    pub service: String,
    pub primary_deployment: String,
    pub deployed_at: DateTime<Utc>,
    /// Seconds between the primary deployment and `now`
    pub seconds_since_deploy: i64,
    pub max_age_seconds: u64,
    pub redeploy: bool,
}

/// Whether a deployment made at `deployed_at` is stale at `now`.
pub fn is_stale(deployed_at: DateTime<Utc>, now: DateTime<Utc>, max_age_seconds: u64) -> bool {
    let max_age_ms = i64::try_from(max_age_seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    (now - deployed_at).num_milliseconds() > max_age_ms
}

/// Decide whether the single described service needs a redeploy.
pub fn evaluate_redeploy(
    services: &[ServiceDescription],
    now: DateTime<Utc>,
    max_age_seconds: u64,
) -> Result<RedeployDecision, RedeployError> {
    let [service] = services else {
        return Err(RedeployError::ServiceCount(services.len()));
    };

    let primaries: Vec<_> = service
        .deployments
        .iter()
        .filter(|d| d.status == PRIMARY_DEPLOYMENT)
        .collect();
    let [primary] = primaries.as_slice() else {
        return Err(RedeployError::PrimaryCount(primaries.len()));
    };

    Ok(RedeployDecision {
        service: service.name.clone(),
        primary_deployment: primary.id.clone(),
        deployed_at: primary.created_at,
        seconds_since_deploy: (now - primary.created_at).num_seconds(),
        max_age_seconds,
        redeploy: is_stale(primary.created_at, now, max_age_seconds),
    })
}

/// Redeploy job for one service
pub struct Redeployer<C> {
    client: C,
    cluster: String,
    service: String,
    max_age_seconds: u64,
}

impl<C: EcsClient> Redeployer<C> {
    pub fn new(client: C, cluster: &str, service: &str, max_age_seconds: u64) -> Self {
        Self {
            client,
            cluster: cluster.to_string(),
            service: service.to_string(),
            max_age_seconds,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Check staleness and force a new deployment when due.
    pub fn run(&mut self, now: DateTime<Utc>) -> Result<RedeployDecision, RedeployError> {
        let services = self
            .client
            .describe_services(&self.cluster, &[self.service.as_str()])?;
        let decision = evaluate_redeploy(&services, now, self.max_age_seconds)?;

        tracing::info!(
            cluster = %self.cluster,
            service = %self.service,
            seconds_since_deploy = decision.seconds_since_deploy,
            "checked primary deployment age"
        );

        if decision.redeploy {
            tracing::info!(service = %self.service, "redeploying");
            self.client.force_new_deployment(&self.cluster, &self.service)?;
        } else {
            tracing::info!(service = %self.service, "not redeploying");
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Deployment;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn deployment(id: &str, status: &str, hours_ago: i64) -> Deployment {
        Deployment {
            id: id.to_string(),
            status: status.to_string(),
            created_at: now() - Duration::hours(hours_ago),
        }
    }

    fn service(deployments: Vec<Deployment>) -> ServiceDescription {
        ServiceDescription {
            name: "web".to_string(),
            deployments,
            load_balancers: Vec::new(),
        }
    }

    #[test]
    fn test_stale_primary_triggers_redeploy() {
        let services = vec![service(vec![
            deployment("d-old", "ACTIVE", 72),
            deployment("d-1", "PRIMARY", 30),
        ])];
        let decision = evaluate_redeploy(&services, now(), 86_400).unwrap();
        assert!(decision.redeploy);
        assert_eq!(decision.primary_deployment, "d-1");
        assert_eq!(decision.seconds_since_deploy, 30 * 3600);
    }

    #[test]
    fn test_fresh_primary_left_alone() {
        let services = vec![service(vec![deployment("d-1", "PRIMARY", 2)])];
        let decision = evaluate_redeploy(&services, now(), 86_400).unwrap();
        assert!(!decision.redeploy);
    }

    #[test]
    fn test_exact_age_is_not_stale() {
        let deployed = now() - Duration::seconds(3600);
        assert!(!is_stale(deployed, now(), 3600));
        assert!(is_stale(deployed - Duration::seconds(1), now(), 3600));
    }

    #[test]
    fn test_service_count_must_be_one() {
        let err = evaluate_redeploy(&[], now(), 60).unwrap_err();
        assert!(matches!(err, RedeployError::ServiceCount(0)));

        let two = vec![
            service(vec![deployment("a", "PRIMARY", 1)]),
            service(vec![deployment("b", "PRIMARY", 1)]),
        ];
        let err = evaluate_redeploy(&two, now(), 60).unwrap_err();
        assert!(matches!(err, RedeployError::ServiceCount(2)));
    }

    #[test]
    fn test_primary_count_must_be_one() {
        let none = vec![service(vec![deployment("a", "ACTIVE", 1)])];
        assert!(matches!(
            evaluate_redeploy(&none, now(), 60).unwrap_err(),
            RedeployError::PrimaryCount(0)
        ));

        let two = vec![service(vec![
            deployment("a", "PRIMARY", 1),
            deployment("b", "PRIMARY", 2),
        ])];
        assert!(matches!(
            evaluate_redeploy(&two, now(), 60).unwrap_err(),
            RedeployError::PrimaryCount(2)
        ));
    }
}
