use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the run output directory is reachable.
    pub data_dir_healthy: bool,
}

/// GET /health -- service and data directory health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let data_dir_healthy = tokio::fs::metadata(&state.config.data_dir)
        .await
        .is_ok_and(|m| m.is_dir());

    Json(HealthResponse {
        status: if data_dir_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        data_dir_healthy,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
