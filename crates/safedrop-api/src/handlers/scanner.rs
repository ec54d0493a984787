use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Scanning daemon diagnostic
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScannerStatus {
    pub enabled: bool,
    pub reachable: bool,
    /// Uploads are rejected when a scan cannot complete.
    pub strict: bool,
}

#[utoipa::path(
    get,
    path = "/api/v0/scanner/ping",
    tag = "scanner",
    responses(
        (status = 200, description = "Scanner status", body = ScannerStatus)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "scanner_ping"))]
pub async fn scanner_ping(State(state): State<Arc<AppState>>) -> Json<ScannerStatus> {
    let reachable = match &state.scan.client {
        Some(client) => client.ping_async().await,
        None => false,
    };
    Json(ScannerStatus {
        enabled: state.scan.client.is_some(),
        reachable,
        strict: state.scan.strict,
    })
}
