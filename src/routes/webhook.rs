// POST /webhook — acknowledge, then deploy out-of-band

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};

use super::AppState;
use crate::deploy::DeployError;

/// The payload is opaque: it only has to be well-formed JSON. A valid
/// request is acknowledged immediately (the caller's timeout is decoupled
/// from deployment duration); the trigger itself only spawns the run. A
/// trigger rejected because a run is in flight is still acknowledged as a
/// no-op.
pub(super) async fn webhook_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        tracing::warn!(operation = "webhook", "rejected malformed payload");
        return (StatusCode::BAD_REQUEST, "malformed webhook payload");
    }

    match state.runner.trigger().await {
        Ok(()) => tracing::info!(operation = "webhook", "deployment trigger accepted"),
        Err(DeployError::AlreadyInProgress) => {
            tracing::info!(
                operation = "webhook",
                "deployment already in progress; trigger ignored"
            );
        }
    }
    (StatusCode::OK, "OK")
}
