//! Unauthenticated service endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

use super::{ApiResponse, AppState, HealthResponse, ServiceInfo};

/// GET /
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "authkeep",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health
///
/// 200 while the database answers `SELECT 1`, 503 otherwise.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let uptime_seconds = state.start_time.elapsed().as_secs();

    match state.store().ping().await {
        Ok(()) => Json(ApiResponse::success(HealthResponse {
            status: "healthy",
            database: true,
            uptime_seconds,
        }))
        .into_response(),
        Err(e) => {
            warn!(event = "health_check_failed", error = %e, "Database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    success: false,
                    data: Some(HealthResponse {
                        status: "unhealthy",
                        database: false,
                        uptime_seconds,
                    }),
                    error: Some("Database unavailable".to_string()),
                }),
            )
                .into_response()
        }
    }
}
