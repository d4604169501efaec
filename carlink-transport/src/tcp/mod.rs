//! TCP transport module.
//!
//! Provides listener setup and the framing contract between the server and
//! field devices.

pub mod framing;
pub mod server;

pub use framing::{WireFraming, wire_len};
pub use server::{TcpServerConfig, bind_listener, peer_address};
