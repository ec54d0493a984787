use crate::sniff::{sniff, SNIFF_LEN};
use bytes::Bytes;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Longest accepted base name, in bytes.
const MAX_BASE_NAME_LEN: usize = 200;

static SAFE_BASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").unwrap_or_else(|e| panic!("invalid base name pattern: {}", e))
});

/// Upload rejection reasons
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("No file was uploaded")]
    MissingFile,

    #[error("File type not allowed")]
    UnknownOrDisallowedType { detected: Option<String> },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

impl ValidationError {
    /// Short machine-readable reason, used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::MissingFile => "missing_file",
            ValidationError::UnknownOrDisallowedType { .. } => "disallowed_type",
            ValidationError::InvalidFilename(_) => "invalid_filename",
        }
    }
}

/// Where the uploaded bytes live.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Bytes),
    /// A staged temp file outside the public storage root.
    File(PathBuf),
}

/// An untrusted upload as received from a client.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub source: Option<UploadSource>,
    pub original_name: String,
    /// Client-declared content type. Never used for decisions.
    pub declared_content_type: Option<String>,
    pub subject_id: u64,
    pub field_name: String,
}

/// A candidate that passed every content check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub detected_mime: String,
    pub extension: String,
    pub sanitized_base: String,
    /// `{subject_id}_{sanitized_base}.{extension}`
    pub stored_filename: String,
    pub size: u64,
}

/// Content-based upload validator
///
/// Decides solely from the bytes and server configuration. It performs no
/// filesystem writes; committing the file is the caller's job.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    max_size: u64,
    /// Detected MIME type -> canonical extension
    allowed_types: Vec<(String, String)>,
}

impl ContentValidator {
    pub fn new(max_size: u64, allowed_types: Vec<(String, String)>) -> Self {
        Self {
            max_size,
            allowed_types,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Canonical extension for an allow-listed MIME type.
    pub fn canonical_extension(&self, mime: &str) -> Option<&str> {
        self.allowed_types
            .iter()
            .find(|(allowed, _)| allowed.eq_ignore_ascii_case(mime))
            .map(|(_, ext)| ext.as_str())
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<ValidatedUpload, ValidationError> {
        let (size, head) = match &candidate.source {
            None => return Err(ValidationError::MissingFile),
            Some(UploadSource::Bytes(bytes)) => {
                let head = bytes.slice(..bytes.len().min(SNIFF_LEN)).to_vec();
                (bytes.len() as u64, head)
            }
            Some(UploadSource::File(path)) => read_head(path)?,
        };

        if size == 0 {
            return Err(ValidationError::MissingFile);
        }

        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        let detected = sniff(&head);
        let extension = detected
            .and_then(|mime| self.canonical_extension(mime))
            .ok_or_else(|| ValidationError::UnknownOrDisallowedType {
                detected: detected.map(str::to_string),
            })?
            .to_string();
        // Checked above; `detected` is Some whenever an extension was found.
        let detected_mime = detected.unwrap_or_default().to_string();

        if let Some(declared) = candidate.declared_content_type.as_deref() {
            if !declared.eq_ignore_ascii_case(&detected_mime) {
                tracing::debug!(
                    declared = %declared,
                    detected = %detected_mime,
                    "Declared content type differs from detected type"
                );
            }
        }

        let sanitized_base = sanitize_base_name(&candidate.original_name)?;
        let stored_filename = format!(
            "{}_{}.{}",
            candidate.subject_id, sanitized_base, extension
        );

        Ok(ValidatedUpload {
            detected_mime,
            extension,
            sanitized_base,
            stored_filename,
            size,
        })
    }
}

fn read_head(path: &std::path::Path) -> Result<(u64, Vec<u8>), ValidationError> {
    let file = File::open(path).map_err(|e| {
        tracing::warn!(error = %e, path = %path.display(), "Failed to open staged upload");
        ValidationError::MissingFile
    })?;
    let size = file
        .metadata()
        .map_err(|_| ValidationError::MissingFile)?
        .len();

    let mut head = Vec::with_capacity(SNIFF_LEN.min(size as usize));
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| {
            tracing::warn!(error = %e, path = %path.display(), "Failed to read staged upload");
            ValidationError::MissingFile
        })?;

    Ok((size, head))
}

/// Reduce a client-declared filename to a safe base name.
///
/// Directory components are stripped (both `/` and `\`), then the final
/// extension is dropped. What remains must consist only of ASCII letters,
/// digits, `_` and `-`, so a second dot (`evil.php.jpg`) is rejected.
pub fn sanitize_base_name(original_name: &str) -> Result<String, ValidationError> {
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    let base = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };

    if base.is_empty() || base.len() > MAX_BASE_NAME_LEN || !SAFE_BASE_NAME.is_match(base) {
        return Err(ValidationError::InvalidFilename(original_name.to_string()));
    }

    Ok(base.to_string())
}
