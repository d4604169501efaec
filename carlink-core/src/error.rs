//! Error types for carlink codec operations.

use thiserror::Error;

/// Core error type for decoding device frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Frame is shorter than the fixed layout of its message type.
    #[error("frame too short for type 0x{tag:02X}: required {required} bytes, available {available} bytes")]
    FrameTooShort {
        /// Type tag found in byte 0.
        tag: u8,
        /// Required frame size in bytes.
        required: usize,
        /// Available frame size in bytes.
        available: usize,
    },

    /// Byte 0 does not name a message type a device may send.
    #[error("unknown message type 0x{tag:02X}")]
    UnknownType {
        /// Type tag found in byte 0.
        tag: u8,
    },

    /// Frame carries no bytes at all.
    #[error("empty frame")]
    Empty,
}

/// Result type alias for carlink core operations.
pub type Result<T> = std::result::Result<T, Error>;
