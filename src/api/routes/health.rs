//! Health check endpoint

use axum::{extract::State, http::StatusCode};
use tracing::error;

use crate::api::ApiState;

/// GET /ping
///
/// Probes the storage backend: 200 when it is reachable, 500 otherwise.
pub async fn ping(State(state): State<ApiState>) -> (StatusCode, String) {
    match state.store.health_check().await {
        Ok(status) if status.healthy => (StatusCode::OK, status.message),
        Ok(status) => {
            error!("storage unhealthy: {}", status.message);
            (StatusCode::INTERNAL_SERVER_ERROR, status.message)
        }
        Err(e) => {
            error!("health check failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
