//! Error types for server operations.

use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] carlink_transport::TransportError),

    /// `start` was called on a running server.
    #[error("server already running")]
    AlreadyRunning,

    /// The connection loop could not be launched.
    #[error("runtime error: {message}")]
    Runtime {
        /// Error message.
        message: String,
    },

    /// The connection loop exited abnormally.
    #[error("server shutdown")]
    Shutdown,
}
