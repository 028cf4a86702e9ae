//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Pings the booking store and reports the result. Always 200 so that probes
/// can read the body.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "bk.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let response = match state.store.ping().await {
        Ok(()) => HealthResponse {
            status: "healthy".to_string(),
            database: Some("healthy".to_string()),
        },
        Err(e) => {
            tracing::warn!(target: "bk.handlers.health", error = %e, "Store ping failed");
            HealthResponse {
                status: "unhealthy".to_string(),
                database: Some("unhealthy".to_string()),
            }
        }
    };

    Json(response)
}
