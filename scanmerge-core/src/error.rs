//! Error types for scanmerge

use thiserror::Error;

/// Main error type for scanmerge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source ended inside a frame header or data block.
    #[error("Truncated source: {0}")]
    TruncatedSource(String),

    /// Data row with the wrong token count or a non-numeric token.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Unsupported field width: {0} (expected 3, 4 or 7)")]
    UnsupportedFieldWidth(usize),

    #[error("Empty input: voxel grid filter requires at least one point")]
    EmptyInput,

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error only ends a PTX read early instead of failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TruncatedSource(_) | Error::MalformedRow { .. })
    }
}

/// Result type alias for scanmerge operations
pub type Result<T> = std::result::Result<T, Error>;
