//! Error types for the batchsheet client.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ClientError`] (**setup**): the client cannot be built or the input
//!   cannot be read at all (bad base URL, missing file). Returned as
//!   `Err(ClientError)` before any network call is made.
//!
//! * [`TransportError`] (**per call**): one request to the extraction backend
//!   failed (non-2xx status, unreachable host, undecodable body). The message
//!   is the backend's own `detail` text whenever it supplied one.
//!
//! * [`RunError`] (**per run**): the single user-visible error of a run. Only
//!   upload and extraction failures, and backend-reported pipeline errors,
//!   become a `RunError`; download and cleanup failures are logged and kept
//!   in the [`crate::session::RunReport`] instead.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which backend call a [`TransportError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Extract,
    Download,
    Cleanup,
}

impl Operation {
    /// Message used when the backend gave no usable error detail.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Upload => "Upload failed",
            Operation::Extract => "Extraction failed",
            Operation::Download => "Failed to download Excel file",
            Operation::Cleanup => "Failed to cleanup files",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::Extract => "extract",
            Operation::Download => "download",
            Operation::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// A failed request to the extraction backend.
///
/// `Display` is the message alone so it can be shown to the user verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub operation: Operation,
    /// HTTP status when the backend answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: Operation, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Error carrying the operation's generic fallback text.
    pub fn fallback(operation: Operation, status: Option<u16>) -> Self {
        Self::new(operation, status, operation.fallback_message())
    }
}

/// The one error a run shows to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    /// Upload or extraction request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Extraction completed but the backend reported an error string.
    #[error("{0}")]
    Pipeline(String),
}

impl RunError {
    /// Text for the error banner.
    pub fn message(&self) -> &str {
        match self {
            RunError::Transport(e) => &e.message,
            RunError::Pipeline(msg) => msg,
        }
    }
}

/// Fatal errors raised before a run can start.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
