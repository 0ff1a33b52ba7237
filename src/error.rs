//! Error types for the export pipeline.
//!
//! The sanitizer passes themselves never fail: malformed side-channel data
//! degrades to the next-best source and broken entities are dropped rather
//! than emitted. Errors surface only at the crate boundary — parsing a
//! snapshot, serializing output, or finding nothing to export at all.

use thiserror::Error;

/// Result type alias for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Error types for export operations
#[derive(Debug, Error)]
pub enum ExportError {
    /// No question/answer turns could be located in the document
    #[error("ERROR: no answer turns found in the document")]
    NoTurns,

    /// HTML serialization failed
    #[error("failed to serialize sanitized HTML: {0}")]
    Serialize(#[from] std::io::Error),

    /// A selector profile could not be loaded
    #[error("invalid selector profile: {0}")]
    Profile(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ExportError {
    fn from(error: anyhow::Error) -> Self {
        ExportError::Other(error.to_string())
    }
}
