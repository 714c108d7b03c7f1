// GET handlers: version and the read-only status API.
// All reads come from the last published snapshot or a registry clone;
// nothing here mutates state or waits for a refresh.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::AppState;
use crate::models::{DeploymentEntry, ServerStatus, SystemMetrics};
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/status — overall fleet state from the current snapshot.
pub(super) async fn api_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    axum::Json(ServerStatus::from(snapshot.as_ref()))
}

/// GET /api/deployments — per-service status, ordered by id.
pub(super) async fn api_deployments_handler(State(state): State<AppState>) -> impl IntoResponse {
    let entries: Vec<DeploymentEntry> = state
        .registry
        .list()
        .await
        .iter()
        .map(DeploymentEntry::from)
        .collect();
    axum::Json(entries)
}

/// GET /api/metrics — utilization plus chart histories. Served from the
/// last published snapshot: stale-but-consistent, never an error for
/// "metrics temporarily stale".
pub(super) async fn api_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    axum::Json(SystemMetrics::from(snapshot.as_ref()))
}

/// GET /api/deploy/last — most recent deployment run record, with exit
/// code and stderr excerpt when it failed.
pub(super) async fn api_last_run_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.runner.last_run().await {
        Some(run) => axum::Json(run).into_response(),
        None => (StatusCode::NOT_FOUND, "no deployment has run yet").into_response(),
    }
}
