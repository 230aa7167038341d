//! Transfer error taxonomy used for retry classification.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Every way a transfer attempt can fail. The retry controller classifies
/// these; only the final one reaches the caller, wrapped in `TransferFailure`.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed URL or parameters. Not retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Local file could not be opened, written or renamed. Not retried.
    #[error("storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Non-success HTTP status.
    #[error("HTTP {status}")]
    Http { status: u32 },
    /// Connection, timeout or other transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Stream ended before the declared length. The received prefix is kept.
    #[error("premature end of segment: expected {expected} bytes, got {received}")]
    PrematureEnd { expected: u64, received: u64 },
    /// Server sent more than it declared; the excess was not written.
    #[error("server sent more than declared: expected {expected} bytes, got {received}")]
    Overflow { expected: u64, received: u64 },
    /// Resume requested but the server answered from byte 0.
    #[error("server ignored Range request at offset {offset}")]
    RangeIgnored { offset: u64 },
    #[error("requested range starting at {requested}, server answered {served}")]
    RangeMismatch { requested: u64, served: String },
    #[error("range starting at {offset} not satisfiable")]
    RangeNotSatisfiable { offset: u64 },
    /// Total size differs from the one an earlier segment reported.
    #[error("total size changed from {known} to {reported}")]
    TotalChanged { known: u64, reported: u64 },
    /// ETag or Last-Modified differs from an earlier segment.
    #[error("remote resource changed: {0}")]
    ResourceChanged(String),
    /// Final byte count disagrees with the known total or with the file on disk.
    #[error("size mismatch: expected {expected} bytes, have {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    /// Stopped through the cancel token. The partial file stays resumable.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Storage {
            path: path.into(),
            source,
        }
    }
}
