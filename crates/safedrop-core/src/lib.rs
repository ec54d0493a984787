//! SafeDrop Core Library
//!
//! This crate provides the configuration, error types and clock abstraction
//! shared by every SafeDrop component.

pub mod clock;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BaseConfig, Config, UploadServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
