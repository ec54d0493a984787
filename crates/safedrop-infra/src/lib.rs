//! SafeDrop Infrastructure Library
//!
//! Shared plumbing for the HTTP service and the operator CLI:
//! - Middleware (request ID, security headers)
//! - Tracing initialization
//! - The JSON error body returned by the API

pub mod error;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use error::ErrorResponse;
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
    SecurityHeaders,
};
pub use telemetry::{init_telemetry, LogFormat};
