use anyhow::Result;
use fleetmon::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let registry = Arc::new(registry::ServiceRegistry::new(
        &app_config.services,
        chrono::Utc::now(),
    ));
    let runner = Arc::new(deploy::DeploymentRunner::new(
        app_config.deploy.clone(),
        registry.clone(),
    ));
    let provider: Arc<dyn metrics::MetricsProvider> = Arc::new(metrics::SysinfoProvider::new());

    let aggregator = aggregator::Aggregator::new(
        provider,
        registry.clone(),
        runner.clone(),
        app_config.monitoring.history_len,
    )
    .await;
    let snapshot_rx = aggregator.subscribe();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let aggregator_handle = aggregator::spawn(
        aggregator,
        aggregator::AggregatorConfig {
            refresh_interval_secs: app_config.monitoring.refresh_interval_secs,
        },
        shutdown_rx,
    );

    let app = routes::app(snapshot_rx, registry, runner.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                tokio::signal::ctrl_c().await
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = aggregator_handle.await;
            // Let an in-flight deploy reach a terminal state before exit.
            runner.wait_idle().await;
        }
    }

    Ok(())
}
