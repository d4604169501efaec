//! Protocol message types.
//!
//! Every frame starts with a one-byte type tag. The [`Message`] struct is the
//! decoded, transient form of a frame: a type, a one-byte id whose meaning
//! depends on the type, and an optional payload.

use std::fmt;

/// Alias values and the reserved bands of the one-byte alias space.
///
/// `0x00` and `0x10..=0xFE` may be registered by devices. `0x01..=0x0F` is
/// the server identity band and `0xFF` marks an unassigned slot.
pub mod alias {
    /// Sentinel for a slot without a registered alias.
    pub const UNASSIGNED: u8 = 0xFF;

    /// Identity the server uses in frames it originates.
    pub const SERVER: u8 = 0x01;

    /// First alias of the server identity band.
    pub const RESERVED_START: u8 = 0x01;

    /// Last alias of the server identity band.
    pub const RESERVED_END: u8 = 0x0F;

    /// Returns true if `alias` lies in the server identity band.
    #[must_use]
    pub const fn is_reserved(alias: u8) -> bool {
        alias >= RESERVED_START && alias <= RESERVED_END
    }

    /// Returns true if a device may register `alias`.
    #[must_use]
    pub const fn is_assignable(alias: u8) -> bool {
        alias != UNASSIGNED && !is_reserved(alias)
    }
}

/// Message type tag carried in byte 0 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Device requests an alias.
    Register = 0x01,
    /// Device asks for the record of an RFID tag.
    RequestRfid = 0x10,
    /// Device reports it has finished the round.
    RoundComplete = 0x11,
    /// Server announces the start of a round.
    RoundStart = 0x20,
    /// Server announces the end of a round.
    RoundEnd = 0x21,
    /// Point-to-point message between devices.
    Custom = 0x70,
    /// Message fanned out to every other device.
    CustomBroadcast = 0x71,
    /// Anything the decoder did not recognise.
    Invalid = 0xFF,
}

impl MessageType {
    /// Maps a type tag to a message type.
    ///
    /// Unknown tags map to [`MessageType::Invalid`].
    #[must_use]
    pub const fn from_u8(tag: u8) -> Self {
        match tag {
            0x01 => Self::Register,
            0x10 => Self::RequestRfid,
            0x11 => Self::RoundComplete,
            0x20 => Self::RoundStart,
            0x21 => Self::RoundEnd,
            0x70 => Self::Custom,
            0x71 => Self::CustomBroadcast,
            _ => Self::Invalid,
        }
    }

    /// Returns the wire tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind.as_u8()
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub kind: MessageType,
    /// Alias being registered, destination alias, source alias or unused.
    pub id: u8,
    /// Optional payload.
    pub payload: Option<Vec<u8>>,
}

impl Message {
    /// Creates a message with the given fields.
    #[must_use]
    pub fn new(kind: MessageType, id: u8, payload: Option<Vec<u8>>) -> Self {
        Self { kind, id, payload }
    }

    /// The message the decoder yields for frames it cannot interpret.
    #[must_use]
    pub fn invalid() -> Self {
        Self::new(MessageType::Invalid, alias::UNASSIGNED, None)
    }

    /// REGISTER request for `alias`.
    #[must_use]
    pub fn register(alias: u8) -> Self {
        Self::new(MessageType::Register, alias, None)
    }

    /// REGISTER reply carrying the attempted alias and a status text.
    #[must_use]
    pub fn register_reply(alias: u8, accepted: bool) -> Self {
        Self::new(MessageType::Register, alias, Some(status(accepted)))
    }

    /// REQUEST_RFID for a 4-byte tag serial.
    #[must_use]
    pub fn request_rfid(serial: [u8; 4]) -> Self {
        Self::new(MessageType::RequestRfid, alias::UNASSIGNED, Some(serial.to_vec()))
    }

    /// ROUND_COMPLETE report.
    #[must_use]
    pub fn round_complete() -> Self {
        Self::new(MessageType::RoundComplete, alias::UNASSIGNED, None)
    }

    /// ROUND_START announcement.
    #[must_use]
    pub fn round_start() -> Self {
        Self::new(MessageType::RoundStart, alias::SERVER, None)
    }

    /// ROUND_END announcement.
    #[must_use]
    pub fn round_end() -> Self {
        Self::new(MessageType::RoundEnd, alias::SERVER, None)
    }

    /// CUSTOM message; `id` is the destination alias on the way in and the
    /// source alias on the way out.
    #[must_use]
    pub fn custom(id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageType::Custom, id, Some(payload.into()))
    }

    /// CUSTOM acknowledgement sent back to the originator of a custom or
    /// broadcast message.
    #[must_use]
    pub fn custom_ack(source: u8, delivered: bool) -> Self {
        Self::new(MessageType::Custom, source, Some(status(delivered)))
    }

    /// CUSTOM_BROADCAST message.
    #[must_use]
    pub fn custom_broadcast(id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageType::CustomBroadcast, id, Some(payload.into()))
    }

    /// Returns the payload, or an empty slice when absent.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }

    /// Returns true if the payload is the `"OK"` status text.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.payload() == STATUS_OK
    }
}

/// Status text for a successful request.
pub const STATUS_OK: &[u8] = b"OK";

/// Status text for a failed request.
pub const STATUS_FAIL: &[u8] = b"FAIL";

fn status(ok: bool) -> Vec<u8> {
    let text = if ok { STATUS_OK } else { STATUS_FAIL };
    text.to_vec()
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}, 0x{:02X}", self.kind.as_u8(), self.id)?;
        if let Some(payload) = &self.payload {
            write!(f, ", {}", String::from_utf8_lossy(payload))?;
        }
        Ok(())
    }
}
