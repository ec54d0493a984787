//! API constants
//!
//! Routes and OpenAPI path annotations share the same version prefix.

pub const API_VERSION: &str = "v0";

/// Versioned prefix for every API route, e.g. `/api/v0/uploads`.
pub const API_PREFIX: &str = "/api/v0";

/// Allowance for multipart boundaries and the text fields sent next to the file.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";
