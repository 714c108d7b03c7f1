// Domain models and wire types for the polling API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which utilization series a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Ram,
}

/// One utilization reading, immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub kind: MetricKind,
    /// Percentage in [0, 100].
    pub value: f64,
    pub captured_at: DateTime<Utc>,
}

/// Service runtime state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Deploying,
    #[serde(other)]
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Deploying => "deploying",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

/// One deployable unit of the fleet. Owned by the ServiceRegistry;
/// mutated only through its methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: u32,
    pub name: String,
    pub version: String,
    pub status: ServiceStatus,
    pub last_deploy_at: DateTime<Utc>,
}

/// Deployment run state machine: Running is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Running,
    Succeeded,
    Failed,
}

/// One execution attempt of the external deployment command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRun {
    pub triggered_at: DateTime<Utc>,
    pub command: String,
    pub status: DeployStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Bounded excerpt of the command's stderr, kept for inspection.
    #[serde(default)]
    pub stderr_excerpt: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Immutable point-in-time aggregate published by the aggregator.
/// Readers always get a whole snapshot; histories are oldest -> newest
/// and always the same length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub cpu_history: Vec<f64>,
    pub ram_history: Vec<f64>,
    pub last_update: DateTime<Utc>,
    /// True when the metrics provider failed this cycle and the usage
    /// values were carried over from the previous one.
    pub degraded: bool,
    pub server: ServiceStatus,
    pub containers: u32,
    pub last_deploy: DateTime<Utc>,
    pub services: Vec<Service>,
}

impl StatusSnapshot {
    /// Placeholder published before the first refresh completes.
    pub fn initial(services: Vec<Service>, at: DateTime<Utc>) -> Self {
        let last_deploy = services
            .iter()
            .map(|s| s.last_deploy_at)
            .max()
            .unwrap_or(at);
        Self {
            cpu_usage: 0.0,
            ram_usage: 0.0,
            cpu_history: Vec::new(),
            ram_history: Vec::new(),
            last_update: at,
            degraded: false,
            server: ServiceStatus::Unknown,
            containers: 0,
            last_deploy,
            services,
        }
    }
}

/// Overall fleet state: deploying wins over everything, a fully running
/// fleet is running, anything else is stopped.
pub fn overall_status(services: &[Service]) -> ServiceStatus {
    if services
        .iter()
        .any(|s| s.status == ServiceStatus::Deploying)
    {
        ServiceStatus::Deploying
    } else if !services.is_empty()
        && services.iter().all(|s| s.status == ServiceStatus::Running)
    {
        ServiceStatus::Running
    } else if services.iter().all(|s| s.status == ServiceStatus::Unknown) {
        ServiceStatus::Unknown
    } else {
        ServiceStatus::Stopped
    }
}

// --- Wire types (camelCase bodies the polling dashboard consumes) ---

/// GET /api/status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub server: String,
    pub containers: u32,
    pub last_deploy: DateTime<Utc>,
}

/// One element of GET /api/deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEntry {
    pub id: u32,
    pub name: String,
    pub version: String,
    pub status: ServiceStatus,
    pub last_deploy: DateTime<Utc>,
}

impl From<&Service> for DeploymentEntry {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            version: s.version.clone(),
            status: s.status,
            last_deploy: s.last_deploy_at,
        }
    }
}

/// GET /api/metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub cpu_history: Vec<f64>,
    pub ram_history: Vec<f64>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub degraded: bool,
}

impl From<&StatusSnapshot> for ServerStatus {
    fn from(snap: &StatusSnapshot) -> Self {
        Self {
            server: snap.server.as_str().to_string(),
            containers: snap.containers,
            last_deploy: snap.last_deploy,
        }
    }
}

impl From<&StatusSnapshot> for SystemMetrics {
    fn from(snap: &StatusSnapshot) -> Self {
        Self {
            cpu_usage: snap.cpu_usage,
            ram_usage: snap.ram_usage,
            cpu_history: snap.cpu_history.clone(),
            ram_history: snap.ram_history.clone(),
            last_update: snap.last_update,
            degraded: snap.degraded,
        }
    }
}
