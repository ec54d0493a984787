use crate::constants::API_VERSION;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub api_version: String,
    /// `enabled` or `disabled`; reachability is reported by the scanner diagnostic.
    pub scanner: String,
}

/// Liveness probe. Does not contact the scanning daemon.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let scanner = if state.scan.client.is_some() {
        "enabled"
    } else {
        "disabled"
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: API_VERSION.to_string(),
        scanner: scanner.to_string(),
    })
}
