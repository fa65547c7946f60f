//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds the per-line size limit.
    ///
    /// Enforced on both encode and decode to bound memory per connection.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Actual frame size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Frame is not a valid JSON event envelope.
    ///
    /// Covers malformed JSON, unknown event names, and missing payload
    /// fields. Fatal for the connection that sent it.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
