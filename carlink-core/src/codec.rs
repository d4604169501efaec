//! Binary codec for device frames.
//!
//! # Uplink layouts (device → server)
//! ```text
//! REGISTER          [0x01][alias]
//! REQUEST_RFID      [0x10][serial: 4 bytes]
//! ROUND_COMPLETE    [0x11]
//! CUSTOM            [0x70][destination alias][payload ...]
//! CUSTOM_BROADCAST  [0x71][payload ...]
//! ```
//!
//! # Downlink layouts (server → device)
//! ```text
//! REGISTER          [0x01][alias]["OK" | "FAIL"]
//! REQUEST_RFID      [0x10][serial: 4][x][y][kind]
//! ROUND_START/END   [0x2X][0x01]
//! CUSTOM            [0x70][source alias][payload ...]
//! CUSTOM_BROADCAST  [0x71][source alias][payload ...]
//! ```
//!
//! Frames carry no length field. See `carlink-transport` for how the
//! server decides how many bytes of an encoded frame go on the wire.

use crate::error::{Error, Result};
use crate::message::{Message, MessageType, alias};

/// Size of the buffer a single receive reads into.
pub const RECV_BUFFER_LEN: usize = 32;

/// Length of a REQUEST_RFID uplink frame.
const RFID_REQUEST_LEN: usize = 5;

/// Decodes an uplink frame, reporting why a frame was rejected.
///
/// `frame` must hold only the valid bytes of the frame.
///
/// # Errors
/// Returns [`Error::Empty`] for an empty frame, [`Error::UnknownType`] for a
/// tag devices may not send and [`Error::FrameTooShort`] when the frame ends
/// before its fixed fields.
pub fn parse(frame: &[u8]) -> Result<Message> {
    let Some(&tag) = frame.first() else {
        return Err(Error::Empty);
    };

    let kind = MessageType::from_u8(tag);
    let message = match kind {
        MessageType::Register => {
            require(tag, frame, 2)?;
            Message::new(kind, frame[1], None)
        }
        MessageType::RequestRfid => {
            require(tag, frame, RFID_REQUEST_LEN)?;
            Message::new(
                kind,
                alias::UNASSIGNED,
                Some(frame[1..RFID_REQUEST_LEN].to_vec()),
            )
        }
        MessageType::RoundComplete => Message::new(kind, alias::UNASSIGNED, None),
        MessageType::Custom => {
            require(tag, frame, 2)?;
            Message::new(kind, frame[1], Some(frame[2..].to_vec()))
        }
        MessageType::CustomBroadcast => {
            Message::new(kind, alias::UNASSIGNED, Some(frame[1..].to_vec()))
        }
        MessageType::RoundStart | MessageType::RoundEnd | MessageType::Invalid => {
            return Err(Error::UnknownType { tag });
        }
    };

    Ok(message)
}

/// Decodes the first `valid_bytes` of `raw` as an uplink frame.
///
/// Never fails: frames [`parse`] rejects decode to [`Message::invalid`].
#[must_use]
pub fn decode(raw: &[u8], valid_bytes: usize) -> Message {
    let frame = &raw[..valid_bytes.min(raw.len())];
    parse(frame).unwrap_or_else(|_| Message::invalid())
}

/// Encodes a message into a frame.
///
/// The frame is `payload.len() + 2` bytes when a payload is present and 2
/// bytes otherwise. ROUND_START and ROUND_END always carry the server
/// identity in byte 1 and never emit payload bytes.
#[must_use]
pub fn encode(message: &Message) -> Vec<u8> {
    let payload = message.payload.as_deref();
    let mut frame = vec![0u8; payload.map_or(2, |p| p.len() + 2)];
    frame[0] = message.kind.as_u8();

    match message.kind {
        MessageType::Register | MessageType::Custom | MessageType::CustomBroadcast => {
            frame[1] = message.id;
            if let Some(payload) = payload {
                frame[2..2 + payload.len()].copy_from_slice(payload);
            }
        }
        MessageType::RequestRfid => {
            if let Some(payload) = payload {
                frame[1..1 + payload.len()].copy_from_slice(payload);
            }
        }
        MessageType::RoundStart | MessageType::RoundEnd => {
            frame[1] = alias::SERVER;
        }
        MessageType::RoundComplete | MessageType::Invalid => {}
    }

    frame
}

/// Encodes a message in the layout a device sends, the inverse of [`parse`].
///
/// Server-only types are encoded with [`encode`].
#[must_use]
pub fn encode_uplink(message: &Message) -> Vec<u8> {
    let tag = message.kind.as_u8();
    let payload = message.payload();
    match message.kind {
        MessageType::Register => vec![tag, message.id],
        MessageType::RequestRfid => {
            let mut frame = Vec::with_capacity(RFID_REQUEST_LEN);
            frame.push(tag);
            frame.extend_from_slice(payload);
            frame
        }
        MessageType::RoundComplete => vec![tag],
        MessageType::Custom => {
            let mut frame = Vec::with_capacity(payload.len() + 2);
            frame.extend_from_slice(&[tag, message.id]);
            frame.extend_from_slice(payload);
            frame
        }
        MessageType::CustomBroadcast => {
            let mut frame = Vec::with_capacity(payload.len() + 1);
            frame.push(tag);
            frame.extend_from_slice(payload);
            frame
        }
        MessageType::RoundStart | MessageType::RoundEnd | MessageType::Invalid => encode(message),
    }
}

/// Decodes a downlink frame as a device receives it.
#[must_use]
pub fn decode_downlink(frame: &[u8]) -> Message {
    let Some(&tag) = frame.first() else {
        return Message::invalid();
    };

    let kind = MessageType::from_u8(tag);
    match kind {
        MessageType::Register | MessageType::Custom | MessageType::CustomBroadcast => {
            match frame.get(1) {
                Some(&id) => Message::new(kind, id, Some(frame[2..].to_vec())),
                None => Message::invalid(),
            }
        }
        MessageType::RequestRfid => {
            let end = frame.len().min(1 + crate::types::TagRecord::ENCODED_LENGTH);
            Message::new(kind, alias::UNASSIGNED, Some(frame[1..end].to_vec()))
        }
        MessageType::RoundStart | MessageType::RoundEnd => {
            Message::new(kind, frame.get(1).copied().unwrap_or(alias::SERVER), None)
        }
        MessageType::RoundComplete => Message::new(kind, alias::UNASSIGNED, None),
        MessageType::Invalid => Message::invalid(),
    }
}

fn require(tag: u8, frame: &[u8], required: usize) -> Result<()> {
    if frame.len() < required {
        return Err(Error::FrameTooShort {
            tag,
            required,
            available: frame.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_register() {
        let msg = decode(&[0x01, 0x20, 0, 0], 2);
        assert_eq!(msg.kind, MessageType::Register);
        assert_eq!(msg.id, 0x20);
        assert!(msg.payload.is_none());
    }

    #[test]
    fn test_decode_request_rfid() {
        let msg = decode(&[0x10, 1, 2, 3, 4], 5);
        assert_eq!(msg.kind, MessageType::RequestRfid);
        assert_eq!(msg.payload(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_custom_uses_valid_bytes() {
        let mut raw = [0u8; RECV_BUFFER_LEN];
        raw[..4].copy_from_slice(&[0x70, 0x30, b'h', b'i']);
        let msg = decode(&raw, 4);
        assert_eq!(msg.kind, MessageType::Custom);
        assert_eq!(msg.id, 0x30);
        assert_eq!(msg.payload(), b"hi");
    }

    #[test]
    fn test_decode_custom_broadcast() {
        let msg = decode(&[0x71, b'g', b'o', 0, 0], 3);
        assert_eq!(msg.kind, MessageType::CustomBroadcast);
        assert_eq!(msg.payload(), b"go");
    }

    #[test]
    fn test_decode_unknown_tag_is_invalid() {
        assert_eq!(decode(&[0x42, 1, 2], 3).kind, MessageType::Invalid);
        assert_eq!(decode(&[0x20, 0x01], 2).kind, MessageType::Invalid);
        assert_eq!(decode(&[], 0).kind, MessageType::Invalid);
    }

    #[test]
    fn test_parse_reports_short_frames() {
        assert_eq!(
            parse(&[0x10, 1, 2]),
            Err(Error::FrameTooShort {
                tag: 0x10,
                required: 5,
                available: 3
            })
        );
        assert!(matches!(parse(&[0x01]), Err(Error::FrameTooShort { .. })));
        assert_eq!(parse(&[0x99]), Err(Error::UnknownType { tag: 0x99 }));
        assert_eq!(parse(&[]), Err(Error::Empty));
    }

    #[test]
    fn test_encode_sizes() {
        assert_eq!(encode(&Message::round_complete()).len(), 2);
        assert_eq!(encode(&Message::custom(0x20, b"hello".to_vec())).len(), 7);
    }

    #[test]
    fn test_encode_register_reply() {
        let frame = encode(&Message::register_reply(0x20, true));
        assert_eq!(frame, vec![0x01, 0x20, b'O', b'K']);
    }

    #[test]
    fn test_encode_rfid_reply_has_no_id_byte() {
        let msg = Message::new(
            MessageType::RequestRfid,
            0x55,
            Some(vec![1, 2, 3, 4, 5, 6, 7]),
        );
        assert_eq!(encode(&msg), vec![0x10, 1, 2, 3, 4, 5, 6, 7, 0]);
    }

    #[test]
    fn test_encode_round_frames_ignore_payload() {
        let mut msg = Message::round_start();
        msg.id = 0x77;
        msg.payload = Some(vec![9, 9, 9]);
        assert_eq!(encode(&msg), vec![0x20, 0x01, 0, 0, 0]);
        assert_eq!(encode(&Message::round_end()), vec![0x21, 0x01]);
    }

    #[test]
    fn test_round_trip_defined_fields() {
        for alias in [0x00u8, 0x10, 0x20, 0xFE] {
            let frame = encode(&Message::register(alias));
            let decoded = decode(&frame, frame.len());
            assert_eq!(decoded.kind, MessageType::Register);
            assert_eq!(decoded.id, alias);
        }

        let frame = encode(&Message::request_rfid([0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(decode(&frame, frame.len()), Message::request_rfid([0xDE, 0xAD, 0xBE, 0xEF]));

        let frame = encode(&Message::round_complete());
        assert_eq!(decode(&frame, frame.len()), Message::round_complete());

        for len in 0..=RECV_BUFFER_LEN - 2 {
            let payload: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
            let original = Message::custom(0x30, payload);
            let frame = encode(&original);
            assert_eq!(decode(&frame, frame.len()), original);
        }
    }

    #[test]
    fn test_decode_downlink() {
        let ack = decode_downlink(&[0x70, 0x20, b'O', b'K']);
        assert_eq!(ack.kind, MessageType::Custom);
        assert_eq!(ack.id, 0x20);
        assert!(ack.is_ok());

        let reply = decode_downlink(&[0x10, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(reply.payload(), &[1, 2, 3, 4, 5, 6, 7]);

        let start = decode_downlink(&[0x20, 0x01]);
        assert_eq!(start.kind, MessageType::RoundStart);
        assert_eq!(start.id, alias::SERVER);

        let broadcast = decode_downlink(&[0x71, 0x01, b'h', b'i']);
        assert_eq!(broadcast.id, 0x01);
        assert_eq!(broadcast.payload(), b"hi");

        assert_eq!(decode_downlink(&[]).kind, MessageType::Invalid);
        assert_eq!(decode_downlink(&[0x70]).kind, MessageType::Invalid);
    }

    #[test]
    fn test_encode_uplink_layouts() {
        assert_eq!(encode_uplink(&Message::register(0x20)), vec![0x01, 0x20]);
        assert_eq!(encode_uplink(&Message::round_complete()), vec![0x11]);
        assert_eq!(
            encode_uplink(&Message::custom_broadcast(alias::UNASSIGNED, "go")),
            vec![0x71, b'g', b'o']
        );
        assert_eq!(
            encode_uplink(&Message::request_rfid([0, 0, 0, 7])),
            vec![0x10, 0, 0, 0, 7]
        );
    }

    #[test]
    fn test_parse_inverts_encode_uplink() {
        let messages = [
            Message::register(0x42),
            Message::request_rfid([0x01, 0x00, 0x03, 0x00]),
            Message::round_complete(),
            Message::custom(0x30, "hi"),
            Message::custom(0x30, Vec::new()),
            Message::custom_broadcast(alias::UNASSIGNED, "all"),
        ];
        for message in messages {
            assert_eq!(parse(&encode_uplink(&message)), Ok(message));
        }
    }
}
