// Service registry: declared fleet metadata plus last-known runtime state

use crate::config::ServiceSpec;
use crate::models::{DeployStatus, Service, ServiceStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Owns every Service record. The aggregator (health refresh) and the
/// deployment runner (deploy outcome) are the only writers; the RwLock
/// serializes them so the two never race on the same record.
pub struct ServiceRegistry {
    inner: RwLock<BTreeMap<u32, Service>>,
}

impl ServiceRegistry {
    /// Seed from the declared fleet. Runtime state starts unknown until
    /// the first refresh or deploy outcome.
    pub fn new(specs: &[ServiceSpec], at: DateTime<Utc>) -> Self {
        let inner = specs
            .iter()
            .map(|spec| {
                (
                    spec.id,
                    Service {
                        id: spec.id,
                        name: spec.name.clone(),
                        version: spec.version.clone(),
                        status: ServiceStatus::Unknown,
                        last_deploy_at: at,
                    },
                )
            })
            .collect();
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// All services, ordered by id.
    pub async fn list(&self) -> Vec<Service> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn running_count(&self) -> u32 {
        self.inner
            .read()
            .await
            .values()
            .filter(|s| s.status == ServiceStatus::Running)
            .count() as u32
    }

    /// Most recent deploy across the fleet.
    pub async fn last_deploy(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .await
            .values()
            .map(|s| s.last_deploy_at)
            .max()
    }

    pub async fn set_status(&self, id: u32, status: ServiceStatus) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let service = inner
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown service id {}", id))?;
        service.status = status;
        Ok(())
    }

    /// Deploy accepted: the whole fleet is mid-deploy until the run ends.
    pub async fn mark_deploying(&self) {
        let mut inner = self.inner.write().await;
        for service in inner.values_mut() {
            service.status = ServiceStatus::Deploying;
        }
    }

    /// Deploy outcome writeback. Success moves everything to running and
    /// advances last_deploy_at; failure moves to stopped and leaves the
    /// deploy timestamp where it was. last_deploy_at never goes backwards.
    pub async fn complete_deploy(&self, success: bool, completed_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        for service in inner.values_mut() {
            if success {
                service.status = ServiceStatus::Running;
                service.last_deploy_at = service.last_deploy_at.max(completed_at);
            } else {
                service.status = ServiceStatus::Stopped;
            }
        }
    }

    /// Health reconciliation for the aggregator. While a run is in flight
    /// everything reads as deploying; afterwards, any record left in
    /// deploying (outcome writeback lost) falls back to the last run's
    /// terminal state.
    pub async fn refresh_health(
        &self,
        deploy_in_flight: bool,
        last_outcome: Option<DeployStatus>,
    ) {
        let mut inner = self.inner.write().await;
        for service in inner.values_mut() {
            if deploy_in_flight {
                service.status = ServiceStatus::Deploying;
            } else if service.status == ServiceStatus::Deploying {
                service.status = match last_outcome {
                    Some(DeployStatus::Succeeded) => ServiceStatus::Running,
                    Some(DeployStatus::Failed) => ServiceStatus::Stopped,
                    Some(DeployStatus::Running) | None => ServiceStatus::Unknown,
                };
            }
        }
    }
}
