// HTTP routes: read-only status API + webhook trigger

mod http;
mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::deploy::DeploymentRunner;
use crate::models::StatusSnapshot;
use crate::registry::ServiceRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot_rx: watch::Receiver<Arc<StatusSnapshot>>,
    pub(crate) registry: Arc<ServiceRegistry>,
    pub(crate) runner: Arc<DeploymentRunner>,
}

pub fn app(
    snapshot_rx: watch::Receiver<Arc<StatusSnapshot>>,
    registry: Arc<ServiceRegistry>,
    runner: Arc<DeploymentRunner>,
) -> Router {
    let state = AppState {
        snapshot_rx,
        registry,
        runner,
    };
    Router::new()
        .route("/", get(|| async { "fleetmon: fleet status service" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::api_status_handler)) // GET /api/status
        .route("/api/deployments", get(http::api_deployments_handler)) // GET /api/deployments
        .route("/api/metrics", get(http::api_metrics_handler)) // GET /api/metrics
        .route("/api/deploy/last", get(http::api_last_run_handler)) // GET /api/deploy/last
        .route("/webhook", post(webhook::webhook_handler)) // POST /webhook
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
