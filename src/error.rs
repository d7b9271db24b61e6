//! Error types for the chat server
//!
//! Uses thiserror for ergonomic error definitions. Connection-scoped
//! errors never cross worker boundaries; the only process-fatal failure
//! is binding the listening socket.

use thiserror::Error;

/// Application-level errors
///
/// Covers transport failures (terminal for one connection) and the
/// handshake rejection path.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on a connection (terminal for that connection only)
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// JSON encode/decode error on a wire frame
    #[error("invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// Handshake rejected before the session was created
    #[error("handshake rejected: {0}")]
    HandshakeRejected(#[from] RejectReason),

    /// Peer closed the connection (clean EOF or close during handshake)
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Socket read timeout expired on a silent peer
    #[error("read timed out")]
    ReadTimeout,
}

/// Why a handshake was refused
///
/// The variant's display string is sent to the peer as the `Reject`
/// message content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("username exceeds {0} characters")]
    UsernameTooLong(usize),

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("expected a connect message")]
    NotConnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_display() {
        let reason = RejectReason::UsernameTaken("alice".to_string());
        assert_eq!(reason.to_string(), "username 'alice' is already taken");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Transport(_)));
    }
}
