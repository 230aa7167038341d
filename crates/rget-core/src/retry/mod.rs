//! Retry and restart policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! premature termination, server inconsistencies) and the per-transfer
//! attempt state machine, so the driver only asks "resume, restart or stop?".

mod classify;
mod controller;
mod error;
mod policy;

pub use classify::{classify, classify_http_status, classify_transport};
pub use controller::{AttemptState, RetryController};
pub use error::TransferError;
pub use policy::{ErrorKind, Recovery, RetryDecision, RetryPolicy, RetrySleep};
