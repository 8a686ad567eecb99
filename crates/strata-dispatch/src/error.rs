//! Dispatcher error types.

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur when submitting or polling operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The per-tier concurrency guard rejected the submission. This is
    /// the expected outcome of racing submits, not a fault.
    #[error("operation already in progress for tier {0}")]
    OperationInProgress(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// The executor reported the request was not delivered.
    #[error("submission failed for tier {tier}: {reason}")]
    SubmitFailed { tier: String, reason: String },
}
