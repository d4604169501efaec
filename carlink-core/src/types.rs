//! Map record types exchanged in REQUEST_RFID replies.

use std::fmt;

/// 4-byte RFID tag serial number.
pub type TagSerial = [u8; 4];

/// Kind byte of a map record.
pub mod tag_kind {
    /// Ordinary floor tile.
    pub const NORMAL: u8 = 0x01;
    /// Treasure tile.
    pub const TREASURE: u8 = 0x02;
    /// First parking point.
    pub const PARK_1: u8 = 0x21;
    /// Second parking point.
    pub const PARK_2: u8 = 0x22;
    /// Third parking point.
    pub const PARK_3: u8 = 0x23;
    /// Fourth parking point.
    pub const PARK_4: u8 = 0x24;
    /// Marker for tags the map does not know.
    pub const INVALID: u8 = 0xFF;

    /// Returns true for the parking point kinds.
    #[must_use]
    pub const fn is_parking(kind: u8) -> bool {
        kind >= PARK_1 && kind <= PARK_4
    }
}

/// Map record for one RFID tag.
///
/// # Wire Format
/// ```text
/// +0: serial  (4 bytes)
/// +4: x       (u8)
/// +5: y       (u8)
/// +6: kind    (u8)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagRecord {
    /// Tag serial number.
    pub serial: TagSerial,
    /// X coordinate on the field.
    pub x: u8,
    /// Y coordinate on the field.
    pub y: u8,
    /// Kind byte, see [`tag_kind`].
    pub kind: u8,
}

impl TagRecord {
    /// Encoded length of a record in bytes.
    pub const ENCODED_LENGTH: usize = 7;

    /// Creates a record.
    #[must_use]
    pub const fn new(serial: TagSerial, x: u8, y: u8, kind: u8) -> Self {
        Self { serial, x, y, kind }
    }

    /// Record returned for tags the map does not contain.
    #[must_use]
    pub const fn unknown(serial: TagSerial) -> Self {
        Self::new(serial, 0xFF, 0xFF, tag_kind::INVALID)
    }

    /// Returns true if this is the sentinel record for an unknown tag.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.kind == tag_kind::INVALID
    }

    /// Returns the `(x, y)` coordinate.
    #[must_use]
    pub const fn coordinate(&self) -> (u8, u8) {
        (self.x, self.y)
    }

    /// Serializes the record to its 7-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LENGTH] {
        let [s0, s1, s2, s3] = self.serial;
        [s0, s1, s2, s3, self.x, self.y, self.kind]
    }

    /// Reads a record from its wire form.
    ///
    /// Returns `None` if `bytes` is shorter than [`Self::ENCODED_LENGTH`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [s0, s1, s2, s3, x, y, kind, ..] => {
                Some(Self::new([*s0, *s1, *s2, *s3], *x, *y, *kind))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.serial {
            write!(f, "{byte:02X}")?;
        }
        write!(f, ", ({},{}), 0x{:02X}", self.x, self.y, self.kind)
    }
}
