// Metrics provider port and the sysinfo-backed implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use sysinfo::System;

/// One CPU + RAM utilization reading, taken on demand.
#[derive(Debug, Clone, Copy)]
pub struct UtilizationSample {
    /// Percentage in [0, 100].
    pub cpu_percent: f64,
    /// Percentage in [0, 100].
    pub ram_percent: f64,
    pub captured_at: DateTime<Utc>,
}

/// Port for the utilization source. The aggregator is the only caller;
/// a failed sample degrades the cycle, it never crashes the loop.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn sample(&self) -> anyhow::Result<UtilizationSample>;
}

/// Real readings via sysinfo. CPU usage needs two refreshes separated by
/// the crate's minimum interval, so sampling runs on the blocking pool.
pub struct SysinfoProvider {
    sys: Arc<std::sync::Mutex<System>>,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
        }
    }
}

#[async_trait]
impl MetricsProvider for SysinfoProvider {
    async fn sample(&self) -> anyhow::Result<UtilizationSample> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_cpu_all();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu_all();
            sys.refresh_memory();

            let cpu = sys.global_cpu_usage() as f64;

            let total = sys.total_memory();
            let available = sys.available_memory();
            let used = total.saturating_sub(available);
            let ram = if total > 0 {
                (used as f64 / total as f64) * 100.0
            } else {
                0.0
            };

            Ok(UtilizationSample {
                cpu_percent: cpu.clamp(0.0, 100.0),
                ram_percent: ram.clamp(0.0, 100.0),
                captured_at: Utc::now(),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
