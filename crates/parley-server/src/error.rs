//! Runtime error types.

use std::fmt;

use crate::driver_error::DriverError;

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing TLS certs, etc.).
    ///
    /// Fatal: fix configuration and restart.
    Config(String),

    /// Transport/network error (connection failure, I/O error, etc.).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    Transport(String),

    /// Protocol error (malformed frame, oversized line, etc.).
    ///
    /// A client sent data this server cannot parse. Fatal for that
    /// connection; the server keeps serving other clients.
    Protocol(String),

    /// Driver error (from `ServerDriver` processing).
    ///
    /// The runtime fed the driver an inconsistent event sequence. Indicates
    /// a bug, not client misbehavior.
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<parley_proto::ProtocolError> for ServerError {
    fn from(err: parley_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("bad bind address".to_string());
        assert_eq!(err.to_string(), "configuration error: bad bind address");

        let err = ServerError::Driver(DriverError::SessionNotFound(42));
        assert_eq!(err.to_string(), "driver error: session not found: 42");
    }

    #[test]
    fn component_errors_convert() {
        let err: ServerError =
            parley_proto::ProtocolError::FrameTooLarge { size: 10, max: 5 }.into();
        assert!(matches!(err, ServerError::Protocol(_)));

        let err: ServerError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(matches!(err, ServerError::Transport(_)));

        let err: ServerError = DriverError::SessionNotFound(1).into();
        assert!(matches!(err, ServerError::Driver(_)));
    }
}
