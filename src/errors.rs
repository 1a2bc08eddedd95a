//! Error types for RagBuddy
//!
//! Every failure the ingestion and answer paths can surface, with a stable
//! kind so callers can branch on it or serialise it.

use serde::Serialize;
use thiserror::Error;

/// Main error type for ingestion and question answering
#[derive(Error, Debug)]
pub enum RagError {
    /// File type not recognised by any decoder
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoded or extracted text is blank
    #[error("No content extracted from {0}")]
    EmptyContent(String),

    /// URL could not be retrieved
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Document or page body could not be recovered
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Vector store (or its embedder) unreachable
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Network-class failure talking to the completion service
    #[error("Model request failed (transient): {0}")]
    ModelTransientFailure(String),

    /// Non-transient completion failure (bad request, auth, malformed reply)
    #[error("Model request failed: {0}")]
    ModelFailure(String),

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RagBuddy operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Stable discriminant of [`RagError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    EmptyContent,
    FetchFailed,
    ExtractionFailed,
    IndexUnavailable,
    ModelTransientFailure,
    ModelFailure,
    InvalidInput,
    Config,
    Io,
}

/// Structured failure handed back from the entrypoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RagError::EmptyContent(_) => ErrorKind::EmptyContent,
            RagError::FetchFailed(_) => ErrorKind::FetchFailed,
            RagError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            RagError::IndexUnavailable(_) => ErrorKind::IndexUnavailable,
            RagError::ModelTransientFailure(_) => ErrorKind::ModelTransientFailure,
            RagError::ModelFailure(_) => ErrorKind::ModelFailure,
            RagError::InvalidInput(_) => ErrorKind::InvalidInput,
            RagError::Config(_) => ErrorKind::Config,
            RagError::Io(_) => ErrorKind::Io,
        }
    }

    /// Only network-class model failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::ModelTransientFailure(_))
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::UnsupportedFormat("image/png".to_string());
        assert!(err.to_string().contains("image/png"));

        let err = RagError::EmptyContent("notes.txt".to_string());
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_only_transient_model_errors_retry() {
        assert!(RagError::ModelTransientFailure("reset".into()).is_transient());
        assert!(!RagError::ModelFailure("401".into()).is_transient());
        assert!(!RagError::IndexUnavailable("down".into()).is_transient());
        assert!(!RagError::FetchFailed("404".into()).is_transient());
    }

    #[test]
    fn test_report_serializes_kind() {
        let report = RagError::FetchFailed("HTTP 404".to_string()).report();
        assert_eq!(report.kind, ErrorKind::FetchFailed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "fetch_failed");
        assert!(json["message"].as_str().unwrap().contains("HTTP 404"));
    }
}
