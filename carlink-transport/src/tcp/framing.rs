//! On-wire framing of encoded frames.
//!
//! Frames carry no length prefix. Field devices expect the server to write
//! each frame up to, but not including, its first zero byte. REQUEST_RFID
//! replies always keep their first 7 bytes because the coordinates may
//! legitimately be zero.
//!
//! A zero byte inside a CUSTOM or CUSTOM_BROADCAST payload truncates the
//! frame under this rule. [`WireFraming::Exact`] writes the whole encoded
//! frame instead, for devices that read a fixed layout.

use carlink_core::MessageType;

/// Offset the zero scan starts from for REQUEST_RFID replies.
pub const RFID_SCAN_START: usize = 7;

/// How many bytes of an encoded frame are written to the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFraming {
    /// Cut each frame at its first zero byte.
    #[default]
    ZeroScan,
    /// Write every encoded byte.
    Exact,
}

impl WireFraming {
    /// Returns the number of bytes of `frame` to write.
    #[must_use]
    pub fn wire_len(self, frame: &[u8]) -> usize {
        match self {
            Self::ZeroScan => wire_len(frame),
            Self::Exact => frame.len(),
        }
    }
}

/// Computes the zero-scan wire length of an encoded frame.
#[must_use]
pub fn wire_len(frame: &[u8]) -> usize {
    let from = match frame.first() {
        Some(&tag) if tag == MessageType::RequestRfid.as_u8() => RFID_SCAN_START,
        _ => 0,
    };
    scan_from(frame, from)
}

/// Returns the index of the first zero byte at or after `from`, or the
/// frame length. Never exceeds the frame length.
fn scan_from(frame: &[u8], from: usize) -> usize {
    frame
        .iter()
        .enumerate()
        .skip(from)
        .find_map(|(idx, &byte)| (byte == 0).then_some(idx))
        .unwrap_or(frame.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carlink_core::{Message, TagRecord, encode};

    #[test]
    fn test_wire_len_register_reply() {
        let frame = encode(&Message::register_reply(0x20, true));
        assert_eq!(wire_len(&frame), 4);
    }

    #[test]
    fn test_wire_len_round_frames() {
        assert_eq!(wire_len(&encode(&Message::round_start())), 2);
        assert_eq!(wire_len(&encode(&Message::round_end())), 2);
    }

    #[test]
    fn test_wire_len_rfid_reply_keeps_zero_coordinates() {
        let record = TagRecord::new([1, 2, 3, 4], 0, 0, 0x01);
        let reply = Message::new(
            MessageType::RequestRfid,
            0xFF,
            Some(record.to_bytes().to_vec()),
        );
        let frame = encode(&reply);
        assert_eq!(frame.len(), 9);
        assert_eq!(wire_len(&frame), 8);
    }

    #[test]
    fn test_wire_len_rfid_reply_zero_kind() {
        let record = TagRecord::new([1, 2, 3, 4], 5, 6, 0x00);
        let reply = Message::new(
            MessageType::RequestRfid,
            0xFF,
            Some(record.to_bytes().to_vec()),
        );
        assert_eq!(wire_len(&encode(&reply)), 7);
    }

    #[test]
    fn test_wire_len_truncates_embedded_zero() {
        let frame = encode(&Message::custom(0x20, vec![b'a', 0, b'b']));
        assert_eq!(wire_len(&frame), 3);
        assert_eq!(WireFraming::Exact.wire_len(&frame), 5);
    }

    #[test]
    fn test_wire_len_zero_alias_truncates() {
        let frame = encode(&Message::register_reply(0x00, true));
        assert_eq!(WireFraming::ZeroScan.wire_len(&frame), 1);
        assert_eq!(WireFraming::Exact.wire_len(&frame), 4);
    }

    #[test]
    fn test_wire_len_short_rfid_frame() {
        assert_eq!(wire_len(&[0x10, 1, 2]), 3);
        assert_eq!(wire_len(&[]), 0);
    }

    #[test]
    fn test_default_is_zero_scan() {
        assert_eq!(WireFraming::default(), WireFraming::ZeroScan);
    }
}
