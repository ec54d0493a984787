//! Document generation boundary
//!
//! A valid download token yields a subject id; the document for that subject
//! comes from a [`DocumentSource`]. Rendering itself happens elsewhere.

use async_trait::async_trait;
use safedrop_core::AppError;
use std::path::PathBuf;

/// A generated artifact ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Document for `subject_id`, or `None` when the subject has none.
    async fn fetch(&self, subject_id: u64) -> Result<Option<GeneratedDocument>, AppError>;
}

/// Serves pre-rendered `{subject_id}.pdf` files from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDocumentSource {
    dir: PathBuf,
}

impl DirectoryDocumentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DocumentSource for DirectoryDocumentSource {
    async fn fetch(&self, subject_id: u64) -> Result<Option<GeneratedDocument>, AppError> {
        let file_name = format!("{}.pdf", subject_id);
        let path = self.dir.join(&file_name);

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(GeneratedDocument {
                path,
                file_name,
                content_type: "application/pdf".to_string(),
                size: metadata.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Internal(format!(
                "Failed to read document for subject {}: {}",
                subject_id, e
            ))),
        }
    }
}
