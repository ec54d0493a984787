//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`; library errors convert through
//! `AppError` so status, body and logging stay consistent. The upload route
//! uses [`UploadError`], which renders the upload JSON shape instead.

use crate::handlers::upload::UploadResponse;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use safedrop_core::{AppError, ErrorMetadata, LogLevel};
use safedrop_infra::ErrorResponse;
use safedrop_processing::ValidationError;
use safedrop_storage::{DeliveryError, StorageError};

/// Wrapper type for AppError to implement IntoResponse
///
/// Orphan rules prevent implementing `IntoResponse` for `AppError` directly.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        HttpAppError(validation_error(err))
    }
}

impl From<DeliveryError> for HttpAppError {
    fn from(err: DeliveryError) -> Self {
        HttpAppError(delivery_error(err))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_error(err))
    }
}

/// Client-facing messages stay generic; the offending value is only logged.
fn validation_error(err: ValidationError) -> AppError {
    match err {
        ValidationError::TooLarge { max, .. } => AppError::PayloadTooLarge(format!(
            "File exceeds the maximum allowed size of {} MB",
            max / 1024 / 1024
        )),
        ValidationError::MissingFile => AppError::InvalidInput("No file provided".to_string()),
        ValidationError::UnknownOrDisallowedType { detected } => {
            tracing::debug!(detected = ?detected, "Upload type not allowed");
            AppError::InvalidInput("File type not allowed".to_string())
        }
        ValidationError::InvalidFilename(name) => {
            tracing::debug!(file_name = %name, "Upload file name rejected");
            AppError::InvalidInput("Invalid file name".to_string())
        }
    }
}

fn delivery_error(err: DeliveryError) -> AppError {
    match err {
        DeliveryError::InvalidName(name) | DeliveryError::OutsideRoot(name) => {
            AppError::PathTraversal(name)
        }
        DeliveryError::DisallowedExtension(_) => {
            AppError::InvalidInput("File type not allowed".to_string())
        }
        DeliveryError::NotFound(name) => AppError::NotFound(name),
        DeliveryError::IoError(e) => AppError::Internal(format!("Delivery I/O error: {}", e)),
    }
}

fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::IoError(e) => AppError::InternalWithSource {
            message: format!("Storage I/O error: {}", e),
            source: e.into(),
        },
        other => AppError::Internal(other.to_string()),
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

fn status_of(error: &AppError) -> StatusCode {
    StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn with_retry_after(mut response: Response, error: &AppError) -> Response {
    if let AppError::RateLimited { retry_after } = error {
        if let Ok(value) = HeaderValue::from_str(&(*retry_after).max(1).to_string()) {
            response.headers_mut().insert("Retry-After", value);
        }
    }
    response
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = status_of(app_error);

        log_error(app_error);

        // Details are never shown in production, nor for sensitive errors.
        let show_details = !is_production_env() && !app_error.is_sensitive();
        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        with_retry_after((status, body).into_response(), app_error)
    }
}

/// Upload failure, rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct UploadError(pub AppError);

impl From<AppError> for UploadError {
    fn from(err: AppError) -> Self {
        UploadError(err)
    }
}

impl From<HttpAppError> for UploadError {
    fn from(err: HttpAppError) -> Self {
        UploadError(err.0)
    }
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError(validation_error(err))
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        UploadError(storage_error(err))
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError(AppError::from(err))
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        log_error(app_error);

        let body = Json(UploadResponse::failure(app_error.client_message()));
        with_retry_after((status_of(app_error), body).into_response(), app_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_client_errors() {
        let too_large = HttpAppError::from(ValidationError::TooLarge {
            size: 20 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        });
        assert_eq!(too_large.0.http_status_code(), 413);

        let disallowed = HttpAppError::from(ValidationError::UnknownOrDisallowedType {
            detected: Some("application/x-php".to_string()),
        });
        assert_eq!(disallowed.0.http_status_code(), 400);
        assert!(!disallowed.0.client_message().contains("php"));

        let bad_name = HttpAppError::from(ValidationError::InvalidFilename(
            "evil.php.jpg".to_string(),
        ));
        assert_eq!(bad_name.0.client_message(), "Invalid file name");
    }

    #[test]
    fn test_delivery_errors() {
        let traversal = HttpAppError::from(DeliveryError::InvalidName("../x".to_string()));
        assert!(matches!(traversal.0, AppError::PathTraversal(_)));
        assert_eq!(traversal.0.http_status_code(), 400);

        let escaped = HttpAppError::from(DeliveryError::OutsideRoot("link.jpg".to_string()));
        assert!(matches!(escaped.0, AppError::PathTraversal(_)));

        let missing = HttpAppError::from(DeliveryError::NotFound("a.jpg".to_string()));
        assert_eq!(missing.0.http_status_code(), 404);
    }

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let response = HttpAppError(AppError::RateLimited { retry_after: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }

    #[test]
    fn test_upload_error_status() {
        let response = UploadError(AppError::ScanUnavailable("refused".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let response = UploadError(AppError::ScanRejected("Eicar".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
