//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured host resolved to no IPv4 address.
    #[error("no IPv4 address available for host {host}")]
    NoLocalAddress {
        /// Host that was resolved.
        host: String,
    },

    /// Binding the listening socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: std::net::SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Creates a no local address error.
    pub fn no_local_address(host: impl Into<String>) -> Self {
        Self::NoLocalAddress { host: host.into() }
    }
}
