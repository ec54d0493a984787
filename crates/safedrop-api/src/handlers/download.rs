//! File and document delivery
//!
//! `?file=` serves a stored upload by name: the caller's address is rate
//! limited and the name goes through the delivery guard. `?token=` serves the
//! document of the subject a valid download token names.

use crate::audit::{AuditEvent, AuditEventType};
use crate::constants::{RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ClientIp;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use safedrop_core::AppError;
use safedrop_infra::ErrorResponse;
use safedrop_services::RateDecision;
use safedrop_storage::{content_disposition, DispositionMode};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;

const CACHE_CONTROL_PRIVATE: &str = "private, no-store";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Stored file name, e.g. `42_passport.png`
    pub file: Option<String>,
    /// Download token issued for a subject's document
    pub token: Option<String>,
    /// `attachment` (default) or `inline`
    pub mode: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v0/download",
    tag = "downloads",
    params(DownloadQuery),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid file name, type or parameters", body = ErrorResponse),
        (status = 403, description = "Invalid or expired token", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(client_ip = %client_ip.0, operation = "download")
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HttpAppError> {
    let mode = match query.mode.as_deref() {
        None => DispositionMode::default(),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::InvalidInput("Invalid mode. Must be 'attachment' or 'inline'".to_string())
        })?,
    };

    match (query.file, query.token) {
        (Some(file), None) => download_file(&state, &client_ip.0, &file, mode).await,
        (None, Some(token)) => download_document(&state, &client_ip.0, &token, mode).await,
        _ => Err(AppError::InvalidInput(
            "Provide exactly one of 'file' or 'token'".to_string(),
        )
        .into()),
    }
}

async fn download_file(
    state: &AppState,
    client_ip: &str,
    requested_name: &str,
    mode: DispositionMode,
) -> Result<Response, HttpAppError> {
    if requested_name.is_empty() {
        return Err(AppError::InvalidInput("Missing file parameter".to_string()).into());
    }

    let limiter = state.rate_limiter.clone();
    let key = client_ip.to_string();
    let decision = tokio::task::spawn_blocking(move || limiter.check(&key))
        .await
        .map_err(|e| AppError::Internal(format!("Rate limit task failed: {}", e)))?;

    if !decision.allowed {
        state.audit.record(
            AuditEvent::new(AuditEventType::RateLimited)
                .client_ip(client_ip)
                .file_name(requested_name),
        );
        let mut response = HttpAppError(AppError::RateLimited {
            retry_after: decision.retry_after_secs,
        })
        .into_response();
        set_rate_limit_headers(&mut response, &decision);
        return Ok(response);
    }

    let resolved = state.delivery.resolve(requested_name).map_err(|e| {
        if e.is_traversal() {
            state.audit.record(
                AuditEvent::new(AuditEventType::PathTraversal)
                    .client_ip(client_ip)
                    .file_name(requested_name),
            );
        }
        HttpAppError::from(e)
    })?;

    tracing::debug!(
        file_name = %resolved.file_name,
        size = resolved.size,
        "Serving stored file"
    );

    let mut response = stream_file(
        &resolved.path,
        &resolved.content_type,
        resolved.size,
        &content_disposition(mode, &resolved.file_name),
    )
    .await?;
    set_rate_limit_headers(&mut response, &decision);
    Ok(response)
}

async fn download_document(
    state: &AppState,
    client_ip: &str,
    token: &str,
    mode: DispositionMode,
) -> Result<Response, HttpAppError> {
    let Some(subject_id) = state.tokens.validate(token) else {
        state
            .audit
            .record(AuditEvent::new(AuditEventType::TokenRejected).client_ip(client_ip));
        return Err(AppError::TokenInvalid.into());
    };

    let document = state
        .documents
        .fetch(subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No document for subject {}", subject_id)))?;

    tracing::debug!(subject_id, size = document.size, "Serving subject document");

    stream_file(
        &document.path,
        &document.content_type,
        document.size,
        &content_disposition(mode, &document.file_name),
    )
    .await
}

async fn stream_file(
    path: &Path,
    content_type: &str,
    size: u64,
    disposition: &str,
) -> Result<Response, HttpAppError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        AppError::Internal(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, CACHE_CONTROL_PRIVATE)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

fn set_rate_limit_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
}
