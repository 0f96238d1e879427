use serde::Serialize;
use serde_json::json;

/// How much attention a failed extraction deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Error type for metadata extraction.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The file is not a container this crate can read.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container was read but carries no generation metadata.
    #[error("No generation metadata found: {0}")]
    MetadataNotFound(String),

    /// Metadata was present but malformed.
    #[error("Failed to parse metadata: {0}")]
    Parse(String),

    #[error("Cannot read {path}: {source}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The probe tool could not be started or exited unsuccessfully.
    #[error("{command} failed: {message}")]
    ExternalCommand { command: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl MetadataError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            MetadataError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            MetadataError::MetadataNotFound(_) => "METADATA_NOT_FOUND",
            MetadataError::Parse(_) => "PARSE_ERROR",
            MetadataError::FileAccess { .. } => "FILE_ACCESS_ERROR",
            MetadataError::ExternalCommand { .. } => "EXTERNAL_COMMAND_ERROR",
            MetadataError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MetadataError::MetadataNotFound(_) => Severity::Low,
            MetadataError::UnsupportedFormat(_)
            | MetadataError::Parse(_)
            | MetadataError::Validation(_) => Severity::Medium,
            MetadataError::ExternalCommand { .. } => Severity::High,
            MetadataError::FileAccess { .. } => Severity::Critical,
        }
    }

    /// JSON body of the form `{ "code", "message", "severity" }`.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
            "severity": self.severity(),
        })
    }
}
