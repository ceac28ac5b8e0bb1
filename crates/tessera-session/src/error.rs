#![forbid(unsafe_code)]

use tessera_core::EngineError;
use thiserror::Error;

/// Result type for synchronous session and registry entry points.
///
/// Asynchronous protocol outcomes (message delivery, key-status changes,
/// update results) never surface here; they go through the callback channel.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors returned by synchronous session and registry operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The opaque engine reported a non-success result.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No usable decryption key is available in the session.
    #[error("no usable key in the session")]
    NoUsableKey,

    /// The decrypt output buffer could not be allocated.
    #[error("clear-content buffer allocation failed")]
    OutputAllocation,

    /// `release_clear_content` was called without a buffer.
    #[error("no clear-content buffer to release")]
    MissingClearContent,
}
