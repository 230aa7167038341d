//! Classify HTTP status, transport errors and transfer errors into retry kinds.

use crate::retry::policy::ErrorKind;
use crate::retry::TransferError;
use crate::transport::TransportError;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a transport failure for retry decisions.
pub fn classify_transport(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Connection(_) => ErrorKind::Connection,
        TransportError::PartialBody(_) => ErrorKind::PrematureEnd,
        TransportError::Other(_) => ErrorKind::Other,
    }
}

/// Classify a transfer error into an ErrorKind.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Http { status } => classify_http_status(*status),
        TransferError::Transport(t) => classify_transport(t),
        TransferError::PrematureEnd { .. } => ErrorKind::PrematureEnd,
        TransferError::RangeIgnored { .. } => ErrorKind::RangeIgnored,
        TransferError::RangeMismatch { .. }
        | TransferError::RangeNotSatisfiable { .. }
        | TransferError::TotalChanged { .. }
        | TransferError::ResourceChanged(_) => ErrorKind::ServerInconsistency,
        TransferError::Overflow { .. } | TransferError::SizeMismatch { .. } => {
            ErrorKind::ProtocolViolation
        }
        TransferError::InvalidRequest(_)
        | TransferError::Storage { .. }
        | TransferError::Cancelled => ErrorKind::Other,
    }
}
