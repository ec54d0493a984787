use thiserror::Error;

/// Errors from committing uploads into the storage root
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Invalid storage name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Reasons a download request is refused
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Empty name, separator, parent-directory sequence or NUL byte.
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File extension not allowed: {0}")]
    DisallowedExtension(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// The name resolved (e.g. through a symlink) outside the storage root.
    #[error("File resolves outside storage root: {0}")]
    OutsideRoot(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DeliveryError {
    /// Whether this refusal should be audited as a path traversal attempt.
    pub fn is_traversal(&self) -> bool {
        matches!(
            self,
            DeliveryError::InvalidName(_) | DeliveryError::OutsideRoot(_)
        )
    }
}
