// Background aggregation: periodic sampling + snapshot publication.
// Collection runs in one task; readers only ever touch published
// snapshots through the watch channel.

use crate::deploy::DeploymentRunner;
use crate::history::HistoryBuffer;
use crate::metrics::{MetricsProvider, UtilizationSample};
use crate::models::{MetricKind, MetricSample, ServiceStatus, StatusSnapshot, overall_status};
use crate::registry::ServiceRegistry;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, interval};

/// Aggregator timing config.
pub struct AggregatorConfig {
    pub refresh_interval_secs: u64,
}

/// Pulls one utilization sample per cycle, reconciles service health with
/// the deployment runner, and publishes an immutable snapshot. Histories
/// are owned here; no other task writes them.
pub struct Aggregator {
    provider: Arc<dyn MetricsProvider>,
    registry: Arc<ServiceRegistry>,
    runner: Arc<DeploymentRunner>,
    cpu_history: HistoryBuffer,
    ram_history: HistoryBuffer,
    last_sample: Option<UtilizationSample>,
    tx: watch::Sender<Arc<StatusSnapshot>>,
}

impl Aggregator {
    pub async fn new(
        provider: Arc<dyn MetricsProvider>,
        registry: Arc<ServiceRegistry>,
        runner: Arc<DeploymentRunner>,
        history_len: usize,
    ) -> Self {
        let services = registry.list().await;
        let initial = Arc::new(StatusSnapshot::initial(services, Utc::now()));
        let (tx, _) = watch::channel(initial);
        Self {
            provider,
            registry,
            runner,
            cpu_history: HistoryBuffer::new(history_len),
            ram_history: HistoryBuffer::new(history_len),
            last_sample: None,
            tx,
        }
    }

    /// Handle for readers. `borrow()` on the receiver is the whole read
    /// path: wait-free, never triggers a refresh, always a complete
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.tx.subscribe()
    }

    /// One refresh cycle. Provider failure degrades the cycle (previous
    /// values are reused and `degraded` is set) but the timestamp still
    /// advances; staleness is observable, never hidden.
    pub async fn refresh(&mut self) {
        let now = Utc::now();
        let degraded = match self.provider.sample().await {
            Ok(sample) => {
                self.last_sample = Some(sample);
                false
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    operation = "sample",
                    "metrics provider unavailable; reusing previous values"
                );
                true
            }
        };

        // Reused values are appended too, so both series keep one point
        // per cycle and stay the same length.
        if let Some(sample) = self.last_sample {
            self.cpu_history.push(MetricSample {
                kind: MetricKind::Cpu,
                value: sample.cpu_percent,
                captured_at: now,
            });
            self.ram_history.push(MetricSample {
                kind: MetricKind::Ram,
                value: sample.ram_percent,
                captured_at: now,
            });
        }

        let (deploy_in_flight, last_outcome) = self.runner.run_state().await;
        self.registry
            .refresh_health(deploy_in_flight, last_outcome)
            .await;
        let services = self.registry.list().await;

        let containers = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Running)
            .count() as u32;
        let last_deploy = services
            .iter()
            .map(|s| s.last_deploy_at)
            .max()
            .unwrap_or(now);
        let (cpu_usage, ram_usage) = match self.last_sample {
            Some(sample) => (sample.cpu_percent, sample.ram_percent),
            None => (0.0, 0.0),
        };

        let snapshot = StatusSnapshot {
            cpu_usage,
            ram_usage,
            cpu_history: self.cpu_history.values(),
            ram_history: self.ram_history.values(),
            last_update: now,
            degraded,
            server: overall_status(&services),
            containers,
            last_deploy,
            services,
        };
        self.tx.send_replace(Arc::new(snapshot));
    }
}

/// Spawns the refresh loop: fixed period, missed ticks skipped (an
/// overrunning cycle drops the next one instead of queueing a backlog),
/// shutdown via oneshot.
pub fn spawn(
    mut aggregator: Aggregator,
    config: AggregatorConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(config.refresh_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    aggregator.refresh().await;
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Aggregator shutting down");
                    break;
                }
            }
        }
    })
}
