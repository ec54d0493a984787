use crate::audit::{AuditEvent, AuditEventType};
use crate::error::UploadError;
use crate::state::AppState;
use crate::utils::{parse_field_name, parse_subject_id, stage_multipart, ClientIp};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use safedrop_core::AppError;
use safedrop_processing::{UploadCandidate, UploadSource};
use safedrop_services::ScanResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Upload outcome
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    /// Server-derived stored name, `{subjectId}_{base}.{extension}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn accepted(filename: String, size: u64) -> Self {
        Self {
            success: true,
            filename: Some(filename),
            size: Some(size),
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            filename: None,
            size: None,
            error: Some(error),
        }
    }
}

/// Multipart body of an upload
#[derive(Debug, ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct UploadForm {
    /// Positive integer identifying the record the file belongs to
    pub subject_id: u64,
    /// Target form field, defaults to `file`
    pub field_name: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File accepted and stored", body = UploadResponse),
        (status = 400, description = "Invalid file, name or type, or malware detected", body = UploadResponse),
        (status = 413, description = "File too large", body = UploadResponse),
        (status = 503, description = "Malware scanning unavailable (strict mode)", body = UploadResponse),
        (status = 500, description = "Internal server error", body = UploadResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(client_ip = %client_ip.0, operation = "upload_file")
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), UploadError> {
    let reject = |reason: &str, subject_id: Option<u64>| {
        let mut event = AuditEvent::new(AuditEventType::UploadRejected)
            .client_ip(client_ip.0.clone())
            .reason(reason);
        event.subject_id = subject_id;
        state.audit.record(event);
    };

    let staged = match stage_multipart(
        multipart,
        &state.upload.staging_dir,
        state.upload.validator.max_size(),
    )
    .await
    {
        Ok(staged) => staged,
        Err(e) => {
            let reason = match &e.0 {
                AppError::PayloadTooLarge(_) => "too_large",
                _ => "malformed_request",
            };
            reject(reason, None);
            return Err(e);
        }
    };

    let subject_id = parse_subject_id(staged.subject_id.as_deref()).inspect_err(|_| {
        reject("invalid_subject", None);
    })?;
    let field_name = parse_field_name(staged.field_name.as_deref()).inspect_err(|_| {
        reject("invalid_field", Some(subject_id));
    })?;

    let candidate = UploadCandidate {
        source: staged
            .file
            .as_ref()
            .map(|temp| UploadSource::File(temp.path().to_path_buf())),
        original_name: staged.original_name.clone(),
        declared_content_type: staged.declared_content_type.clone(),
        subject_id,
        field_name,
    };

    let validated = match state.upload.validator.validate(&candidate) {
        Ok(validated) => validated,
        Err(e) => {
            reject(e.kind(), Some(subject_id));
            return Err(e.into());
        }
    };

    let temp = staged
        .file
        .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    if let Some(scanner) = &state.scan.client {
        match scanner.scan_file(temp.path().to_path_buf()).await {
            ScanResult::Clean => {}
            ScanResult::Infected(signature) => {
                state.audit.record(
                    AuditEvent::new(AuditEventType::MalwareDetected)
                        .client_ip(client_ip.0.clone())
                        .subject_id(subject_id)
                        .file_name(validated.stored_filename.clone())
                        .reason(signature.clone()),
                );
                return Err(AppError::ScanRejected(signature).into());
            }
            ScanResult::Unknown(message) => {
                state.audit.record(
                    AuditEvent::new(AuditEventType::ScanUnavailable)
                        .client_ip(client_ip.0.clone())
                        .subject_id(subject_id)
                        .reason(message.clone()),
                );
                if state.scan.strict {
                    return Err(AppError::ScanUnavailable(message).into());
                }
                tracing::warn!(
                    error = %message,
                    "Malware scan did not complete, accepting upload (strict mode off)"
                );
            }
        }
    }

    // Closes the staged handle; the path is removed on drop if the commit fails.
    let staged_path = temp.into_temp_path();
    state
        .upload
        .storage
        .commit(&staged_path, &validated.stored_filename)
        .await?;

    state.audit.record(
        AuditEvent::new(AuditEventType::UploadAccepted)
            .client_ip(client_ip.0.clone())
            .subject_id(subject_id)
            .file_name(validated.stored_filename.clone()),
    );

    tracing::info!(
        subject_id,
        stored_filename = %validated.stored_filename,
        detected_mime = %validated.detected_mime,
        size = validated.size,
        "Upload stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::accepted(
            validated.stored_filename,
            validated.size,
        )),
    ))
}
