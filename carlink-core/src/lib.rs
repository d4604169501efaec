//! # carlink Core
//!
//! Message types and the binary codec shared by the carlink server and the
//! field-device client.
//!
//! This crate provides:
//! - [`message`] - Message type tags, the alias space and [`Message`]
//! - [`codec`] - Frame encoding and decoding
//! - [`types`] - Map records returned for RFID lookups
//! - [`error`] - Decode errors

pub mod codec;
pub mod error;
pub mod message;
pub mod types;

pub use codec::{RECV_BUFFER_LEN, decode, decode_downlink, encode, encode_uplink, parse};
pub use error::{Error, Result};
pub use message::{Message, MessageType, STATUS_FAIL, STATUS_OK, alias};
pub use types::{TagRecord, TagSerial, tag_kind};
