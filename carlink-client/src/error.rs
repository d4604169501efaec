//! Error types for client operations.

use thiserror::Error;

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// No matching reply arrived in time.
    #[error("reply timeout")]
    ReplyTimeout,

    /// Connection closed by server.
    #[error("connection closed")]
    ConnectionClosed,

    /// Every connection attempt allowed by the retry policy failed.
    #[error("connection failed after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}
