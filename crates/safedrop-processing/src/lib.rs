//! Content inspection for untrusted uploads.
//!
//! `sniff` identifies a file from its leading bytes; `validator` turns an
//! upload candidate into a trusted storage name or a typed rejection.

pub mod sniff;
pub mod validator;

pub use sniff::{sniff, SNIFF_LEN};
pub use validator::{
    sanitize_base_name, ContentValidator, UploadCandidate, UploadSource, ValidatedUpload,
    ValidationError,
};
