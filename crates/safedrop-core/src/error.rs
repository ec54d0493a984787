//! Error types module
//!
//! All failures that cross the HTTP boundary are unified under `AppError`.
//! Each variant self-describes how it is presented to clients through
//! `ErrorMetadata`.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for security events and degraded dependencies
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "RATE_LIMITED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// The scanning daemon reported a signature. The name is kept for logs only.
    #[error("Malware detected: {0}")]
    ScanRejected(String),

    #[error("Malware scan unavailable: {0}")]
    ScanUnavailable(String),

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check the file and request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::RateLimited { .. } => (
            429,
            "RATE_LIMITED",
            true,
            Some("Wait for the Retry-After interval and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::ScanRejected(_) => (
            400,
            "UPLOAD_REJECTED",
            false,
            None,
            true,
            LogLevel::Warn,
        ),
        AppError::ScanUnavailable(_) => (
            503,
            "SCAN_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::TokenInvalid => (
            403,
            "FORBIDDEN",
            false,
            Some("Request a new download link"),
            false,
            LogLevel::Debug,
        ),
        AppError::PathTraversal(_) => (
            400,
            "INVALID_FILE_NAME",
            false,
            None,
            true,
            LogLevel::Warn,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::ScanRejected(_) => "ScanRejected",
            AppError::ScanUnavailable(_) => "ScanUnavailable",
            AppError::TokenInvalid => "TokenInvalid",
            AppError::PathTraversal(_) => "PathTraversal",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(_) => "File not found".to_string(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::RateLimited { .. } => "Too many requests. Please slow down.".to_string(),
            AppError::ScanRejected(_) => "File rejected".to_string(),
            AppError::ScanUnavailable(_) => {
                "File scanning is temporarily unavailable".to_string()
            }
            AppError::TokenInvalid => "Access denied".to_string(),
            AppError::PathTraversal(_) => "Invalid file name".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_rate_limited() {
        let err = AppError::RateLimited { retry_after: 12 };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.error_code(), "RATE_LIMITED");
        assert!(err.is_recoverable());
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_scan_rejected_hides_signature() {
        let err = AppError::ScanRejected("Eicar-Signature".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("Eicar"));
        assert!(err.to_string().contains("Eicar-Signature"));
    }

    #[test]
    fn test_token_failures_are_uniform() {
        let err = AppError::TokenInvalid;
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.client_message(), "Access denied");
    }

    #[test]
    fn test_not_found_does_not_echo_name() {
        let err = AppError::NotFound("secret_name.pdf".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert!(!err.client_message().contains("secret_name"));
    }

    #[test]
    fn test_internal_with_source_chain() {
        let err = AppError::from(anyhow::anyhow!("disk full"));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_type(), "Internal");
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.detailed_message().contains("disk full"));
    }

    #[test]
    fn test_scan_unavailable_is_503() {
        let err = AppError::ScanUnavailable("connection refused".to_string());
        assert_eq!(err.http_status_code(), 503);
        assert!(!err.client_message().contains("refused"));
    }
}
