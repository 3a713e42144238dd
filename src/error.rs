//! Error types for ingestion and analysis

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building, parsing, ingesting or analyzing messages
#[derive(Error, Debug)]
pub enum MailError {
    /// A required message field was not supplied
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A message field was supplied but could not be interpreted
    #[error("Invalid value for {field}: {details}")]
    InvalidField { field: &'static str, details: String },

    /// A single message source could not be decoded
    #[error("Failed to parse message source '{source_id}': {reason}")]
    Parsing { source_id: String, reason: String },

    /// The requested folder does not exist in the mail source
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The underlying storage could not be read
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Analysis was requested over an input it cannot accept
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Error class, as seen by callers deciding whether to skip, abort or fix input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing message fields at construction
    Validation,
    /// One message source could not be decoded; skippable
    Parsing,
    /// The folder or storage is unavailable; fatal to the call
    Connection,
    /// Analysis input contract violated
    Analysis,
}

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parsing(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parsing {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::InvalidField { .. } | Self::Config(_) => {
                ErrorKind::Validation
            }
            Self::Parsing { .. } => ErrorKind::Parsing,
            Self::FolderNotFound(_) | Self::Io { .. } => ErrorKind::Connection,
            Self::Analysis(_) => ErrorKind::Analysis,
        }
    }
}

/// Result type for this crate
pub type Result<T> = std::result::Result<T, MailError>;
