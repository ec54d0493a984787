//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::handlers;
use safedrop_infra::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SafeDrop API",
        version = "0.1.0",
        description = "Untrusted file uploads with content validation and malware scanning, rate-limited file delivery and token-authorized document downloads. Endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::upload::upload_file,
        handlers::download::download,
        handlers::scanner::scanner_ping,
        handlers::health::health_check,
    ),
    components(schemas(
        handlers::upload::UploadResponse,
        handlers::upload::UploadForm,
        handlers::scanner::ScannerStatus,
        handlers::health::HealthResponse,
        ErrorResponse,
    )),
    tags(
        (name = "uploads", description = "File upload"),
        (name = "downloads", description = "File and document delivery"),
        (name = "scanner", description = "Malware scanner diagnostics"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
