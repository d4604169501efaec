//! # carlink Client
//!
//! Async client speaking the field-device side of the carlink protocol.
//!
//! This crate provides:
//! - [`DeviceBuilder`] and [`DeviceClient`] for connecting and issuing
//!   requests
//! - [`RetryPolicy`] for connecting with exponential backoff
//!
//! The protocol has no length prefix: one read is one message, as on the
//! devices themselves.

pub mod device;
pub mod error;
pub mod retry;

pub use device::{DeviceBuilder, DeviceClient};
pub use error::ClientError;
pub use retry::RetryPolicy;
