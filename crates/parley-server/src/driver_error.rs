//! Driver error types.

use thiserror::Error;

/// Errors from `ServerDriver` event processing.
///
/// Client misbehavior (spoofed senders, frames before login, unknown
/// recipients) never surfaces here - those are handled in-band by dropping
/// and logging. A `DriverError` means the runtime fed the driver an event
/// that contradicts its own bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// An event named a session the driver never accepted.
    ///
    /// The runtime must emit `ConnectionAccepted` before any frames for that
    /// session. Indicates a runtime bug, not a client error.
    #[error("session not found: {0}")]
    SessionNotFound(u64),
}
