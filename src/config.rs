use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub deploy: DeployConfig,
    pub services: Vec<ServiceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Aggregator refresh period; pollers are expected to re-fetch on
    /// roughly the same interval.
    pub refresh_interval_secs: u64,
    /// Samples kept per metric series (chart width).
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

fn default_history_len() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Shell command executed on each accepted webhook trigger.
    pub command: String,
    /// A run exceeding this is killed and marked failed.
    pub timeout_secs: u64,
    /// Max bytes of stderr retained on the run record.
    #[serde(default = "default_stderr_excerpt_max")]
    pub stderr_excerpt_max: usize,
}

fn default_stderr_excerpt_max() -> usize {
    1024
}

/// Declared fleet member (runtime state lives in the registry).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    pub id: u32,
    pub name: String,
    pub version: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.monitoring.refresh_interval_secs > 0,
            "monitoring.refresh_interval_secs must be > 0, got {}",
            self.monitoring.refresh_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.history_len > 0,
            "monitoring.history_len must be > 0, got {}",
            self.monitoring.history_len
        );
        anyhow::ensure!(
            !self.deploy.command.trim().is_empty(),
            "deploy.command must be non-empty"
        );
        anyhow::ensure!(
            self.deploy.timeout_secs > 0,
            "deploy.timeout_secs must be > 0, got {}",
            self.deploy.timeout_secs
        );
        anyhow::ensure!(
            self.deploy.stderr_excerpt_max > 0,
            "deploy.stderr_excerpt_max must be > 0, got {}",
            self.deploy.stderr_excerpt_max
        );
        anyhow::ensure!(!self.services.is_empty(), "services must declare at least one entry");
        let mut seen = std::collections::HashSet::new();
        for spec in &self.services {
            anyhow::ensure!(
                spec.id > 0,
                "services.id must be > 0, got {} ({})",
                spec.id,
                spec.name
            );
            anyhow::ensure!(
                seen.insert(spec.id),
                "services.id must be unique, {} appears twice",
                spec.id
            );
            anyhow::ensure!(
                !spec.name.trim().is_empty(),
                "services.name must be non-empty (id {})",
                spec.id
            );
            anyhow::ensure!(
                !spec.version.trim().is_empty(),
                "services.version must be non-empty ({})",
                spec.name
            );
        }
        Ok(())
    }
}
