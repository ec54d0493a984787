//! Multipart staging for uploads
//!
//! The file part is streamed into a temp file inside the private staging
//! directory. Nothing is written under the public storage root here.

use crate::error::UploadError;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use safedrop_core::AppError;
use safedrop_processing::ValidationError;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

const FILE_FIELD: &str = "file";
const SUBJECT_ID_FIELD: &str = "subjectId";
const FIELD_NAME_FIELD: &str = "fieldName";
const MAX_FIELD_NAME_LEN: usize = 64;

/// Everything the client sent, with the file bytes staged on disk.
#[derive(Debug)]
pub struct StagedUpload {
    /// Deleted on drop unless committed.
    pub file: Option<NamedTempFile>,
    pub size: u64,
    pub original_name: String,
    pub declared_content_type: Option<String>,
    pub subject_id: Option<String>,
    pub field_name: Option<String>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large".to_string())
    } else {
        tracing::debug!(error = %e.body_text(), "Malformed multipart body");
        AppError::InvalidInput("Malformed multipart request".to_string())
    }
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

/// Stream the multipart body into `staging_dir`.
///
/// Exactly one `file` part is accepted. Streaming stops as soon as the file
/// exceeds `max_size`, and the partial temp file is removed.
pub async fn stage_multipart(
    mut multipart: Multipart,
    staging_dir: &Path,
    max_size: u64,
) -> Result<StagedUpload, UploadError> {
    let mut staged = StagedUpload {
        file: None,
        size: 0,
        original_name: String::new(),
        declared_content_type: None,
        subject_id: None,
        field_name: None,
    };

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                if staged.file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    )
                    .into());
                }
                staged.original_name = field.file_name().unwrap_or_default().to_string();
                staged.declared_content_type = field.content_type().map(str::to_string);

                let temp = tempfile::Builder::new()
                    .prefix("upload-")
                    .tempfile_in(staging_dir)?;
                let mut out = tokio::fs::File::from_std(temp.as_file().try_clone()?);

                let mut size: u64 = 0;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    size += chunk.len() as u64;
                    if size > max_size {
                        return Err(ValidationError::TooLarge {
                            size,
                            max: max_size,
                        }
                        .into());
                    }
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;

                tracing::debug!(
                    size,
                    path = %temp.path().display(),
                    "Staged upload"
                );
                staged.size = size;
                staged.file = Some(temp);
            }
            SUBJECT_ID_FIELD => staged.subject_id = Some(text_field(field).await?),
            FIELD_NAME_FIELD => staged.field_name = Some(text_field(field).await?),
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    Ok(staged)
}

/// Parse the declared subject id: a positive decimal integer.
pub fn parse_subject_id(raw: Option<&str>) -> Result<u64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing subjectId".to_string()))?;

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidInput(
            "subjectId must be a positive integer".to_string(),
        ));
    }
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(
            "subjectId must be a positive integer".to_string(),
        )),
    }
}

/// The declared target field, defaulting to `file`.
pub fn parse_field_name(raw: Option<&str>) -> Result<String, AppError> {
    let name = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(FILE_FIELD);
    if name.len() > MAX_FIELD_NAME_LEN
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::InvalidInput("Invalid fieldName".to_string()));
    }
    Ok(name.to_string())
}
