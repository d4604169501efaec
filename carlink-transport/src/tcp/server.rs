//! TCP listener setup.

use crate::error::TransportError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Configuration for the listening socket.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Host name or IPv4 address to bind to.
    pub host: String,
    /// Port to bind to. `0` lets the OS pick one.
    pub port: u16,
    /// Listen backlog.
    pub backlog: i32,
    /// Enable TCP_NODELAY on accepted sockets.
    pub tcp_nodelay: bool,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            backlog: 5,
            tcp_nodelay: true,
        }
    }
}

impl TcpServerConfig {
    /// Creates a new config for the given host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Enables or disables TCP_NODELAY on accepted sockets.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Resolves the host to the first IPv4 socket address.
    ///
    /// # Errors
    /// Returns [`TransportError::NoLocalAddress`] if the host does not resolve
    /// to any IPv4 address.
    pub fn resolve(&self) -> Result<SocketAddr, TransportError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.find(SocketAddr::is_ipv4))
            .ok_or_else(|| TransportError::no_local_address(&self.host))
    }
}

/// Binds a non-blocking IPv4 listener with `SO_REUSEADDR` set.
///
/// # Errors
/// Returns a [`TransportError`] if the host cannot be resolved or the socket
/// cannot be bound or put into listening state.
pub fn bind_listener(config: &TcpServerConfig) -> Result<TcpListener, TransportError> {
    let addr = config.resolve()?;

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&addr.into())
        .map_err(|source| TransportError::Bind { addr, source })?;
    socket.listen(config.backlog)?;
    socket.set_nonblocking(true)?;

    let listener: TcpListener = socket.into();
    tracing::debug!("Listener bound on {}", listener.local_addr()?);
    Ok(listener)
}

/// Returns the address string a client is identified by: its IP without
/// the port.
#[must_use]
pub fn peer_address(addr: &SocketAddr) -> String {
    addr.ip().to_canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_server_config_default() {
        let config = TcpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.backlog, 5);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_tcp_server_config_builder() {
        let config = TcpServerConfig::new("127.0.0.1", 0)
            .backlog(16)
            .tcp_nodelay(false);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.backlog, 16);
        assert!(!config.tcp_nodelay);
    }

    #[test]
    fn test_resolve_ipv4() {
        let addr = TcpServerConfig::new("127.0.0.1", 5000).resolve().unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_resolve_ipv6_only_host_fails() {
        let result = TcpServerConfig::new("::1", 5000).resolve();
        assert!(matches!(result, Err(TransportError::NoLocalAddress { .. })));
    }

    #[test]
    fn test_bind_listener_ephemeral_port() {
        let listener = bind_listener(&TcpServerConfig::new("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.is_ipv4());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_bind_listener_port_in_use() {
        let first = bind_listener(&TcpServerConfig::new("127.0.0.1", 0)).unwrap();
        let port = first.local_addr().unwrap().port();
        let second = bind_listener(&TcpServerConfig::new("127.0.0.1", port));
        assert!(second.is_err());
    }

    #[test]
    fn test_peer_address_strips_port() {
        let addr: SocketAddr = "10.0.0.5:40123".parse().unwrap();
        assert_eq!(peer_address(&addr), "10.0.0.5");

        let mapped: SocketAddr = "[::ffff:10.0.0.5]:40123".parse().unwrap();
        assert_eq!(peer_address(&mapped), "10.0.0.5");
    }
}
