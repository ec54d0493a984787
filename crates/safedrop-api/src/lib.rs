//! SafeDrop API Library
//!
//! HTTP handlers, application state and setup for the upload service.

mod api_doc;
pub mod audit;
pub mod constants;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod utils;

pub use audit::{AuditEvent, AuditEventType, AuditLog, AuditSink, FileAuditSink, TracingAuditSink};
pub use documents::{DirectoryDocumentSource, DocumentSource, GeneratedDocument};
pub use error::{HttpAppError, UploadError};
pub use state::AppState;
