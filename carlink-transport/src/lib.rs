//! # carlink Transport
//!
//! Network transport layer for the carlink server.
//!
//! This crate provides:
//! - [`tcp`] - Listener binding and the on-wire framing of encoded frames

pub mod error;
pub mod tcp;

pub use error::TransportError;
