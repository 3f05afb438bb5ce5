//! Typed attribute values.
//!
//! Each record carries a four-character type tag followed by a payload whose
//! layout depends on the tag. The set of tags is closed: anything else is
//! rejected on decode.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::types::cursor::{Cursor, CursorError, PutBigEndian, utf16_len};
use crate::types::FourCC;

/// Type tag for `Value::Bool`.
pub const TAG_BOOL: FourCC = FourCC(*b"bool");
/// Type tag for `Value::Long`.
pub const TAG_LONG: FourCC = FourCC(*b"long");
/// Type tag for `Value::Short`.
pub const TAG_SHORT: FourCC = FourCC(*b"shor");
/// Type tag for `Value::Blob`.
pub const TAG_BLOB: FourCC = FourCC(*b"blob");
/// Type tag for `Value::Type`.
pub const TAG_TYPE: FourCC = FourCC(*b"type");
/// Type tag for `Value::Text`.
pub const TAG_TEXT: FourCC = FourCC(*b"ustr");
/// Type tag for `Value::Comp`.
pub const TAG_COMP: FourCC = FourCC(*b"comp");
/// Type tag for `Value::Timestamp`.
pub const TAG_TIMESTAMP: FourCC = FourCC(*b"dutc");

/// A record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    /// 32-bit integer (`long`).
    Long(u32),
    /// 32-bit integer (`shor`). Despite the name it occupies 4 bytes on disk.
    Short(u32),
    /// Opaque bytes with a 32-bit length prefix.
    Blob(Vec<u8>),
    /// A four-character code used as a value.
    Type(FourCC),
    /// UTF-16 text with a 32-bit code unit count.
    Text(String),
    /// 64-bit integer (`comp`).
    Comp(u64),
    Timestamp(MacTime),
}

impl Value {
    /// The on-disk type tag for this variant.
    #[must_use]
    pub const fn type_tag(&self) -> FourCC {
        match self {
            Self::Bool(_) => TAG_BOOL,
            Self::Long(_) => TAG_LONG,
            Self::Short(_) => TAG_SHORT,
            Self::Blob(_) => TAG_BLOB,
            Self::Type(_) => TAG_TYPE,
            Self::Text(_) => TAG_TEXT,
            Self::Comp(_) => TAG_COMP,
            Self::Timestamp(_) => TAG_TIMESTAMP,
        }
    }

    /// Size of the payload in bytes, excluding the type tag.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Bool(_) => 1,
            Self::Long(_) | Self::Short(_) | Self::Type(_) => 4,
            Self::Blob(bytes) => 4 + bytes.len(),
            Self::Text(text) => 4 + 2 * utf16_len(text),
            Self::Comp(_) | Self::Timestamp(_) => 8,
        }
    }

    /// Append the payload (without the type tag) to `out`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Bool(b) => out.push(u8::from(*b)),
            Self::Long(v) | Self::Short(v) => out.put_u32(*v),
            Self::Blob(bytes) => {
                out.put_u32(bytes.len() as u32);
                out.extend_from_slice(bytes);
            }
            Self::Type(code) => out.extend_from_slice(code.as_bytes()),
            Self::Text(text) => {
                out.put_u32(utf16_len(text) as u32);
                out.put_utf16(text);
            }
            Self::Comp(v) => out.put_u64(*v),
            Self::Timestamp(t) => out.put_u64(t.0),
        }
    }

    /// Decode a payload whose type tag has already been read.
    pub fn decode(tag: FourCC, cursor: &mut Cursor<'_>) -> Result<Self, ValueError> {
        let value = match &tag.0 {
            b"bool" => Self::Bool(cursor.read_u8()? != 0),
            b"long" => Self::Long(cursor.read_u32()?),
            b"shor" => Self::Short(cursor.read_u32()?),
            b"blob" => {
                let len = cursor.read_u32()? as usize;
                Self::Blob(cursor.read_bytes(len)?.to_vec())
            }
            b"type" => Self::Type(cursor.read_four_cc()?),
            b"ustr" => {
                let units = cursor.read_u32()? as usize;
                Self::Text(cursor.read_utf16(units)?)
            }
            b"comp" => Self::Comp(cursor.read_u64()?),
            b"dutc" => Self::Timestamp(MacTime(cursor.read_u64()?)),
            _ => return Err(ValueError::UnknownType(tag)),
        };
        Ok(value)
    }

    /// Interpret a `blob` value as an icon location.
    #[must_use]
    pub fn as_icon_location(&self) -> Option<IconLocation> {
        match self {
            Self::Blob(bytes) => IconLocation::from_bytes(bytes),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<IconLocation> for Value {
    fn from(location: IconLocation) -> Self {
        Self::Blob(location.to_bytes().to_vec())
    }
}

/// Seconds between 1904-01-01 and 1970-01-01, both UTC.
const MAC_EPOCH_OFFSET_SECS: u64 = 2_082_844_800;

/// A Mac timestamp in 1/65536 second ticks since 1904-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacTime(pub u64);

impl MacTime {
    const TICKS_PER_SEC: u64 = 1 << 16;

    /// Convert from a `SystemTime`, truncating to the tick resolution.
    ///
    /// Returns `None` for times before 1904 or too far in the future.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let since_1904 = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.checked_add(Duration::from_secs(MAC_EPOCH_OFFSET_SECS))?,
            Err(e) => Duration::from_secs(MAC_EPOCH_OFFSET_SECS).checked_sub(e.duration())?,
        };
        let whole = since_1904.as_secs().checked_mul(Self::TICKS_PER_SEC)?;
        let frac = u64::from(since_1904.subsec_nanos()) * Self::TICKS_PER_SEC / 1_000_000_000;
        Some(Self(whole.checked_add(frac)?))
    }

    #[must_use]
    pub fn to_system_time(self) -> SystemTime {
        let secs = self.0 / Self::TICKS_PER_SEC;
        let nanos = (self.0 % Self::TICKS_PER_SEC) * 1_000_000_000 / Self::TICKS_PER_SEC;
        let since_1904 = Duration::new(secs, u32::try_from(nanos).unwrap_or(0));
        let epoch_1904 = UNIX_EPOCH - Duration::from_secs(MAC_EPOCH_OFFSET_SECS);
        epoch_1904 + since_1904
    }
}

/// Icon position stored under the `Iloc` code.
///
/// The blob is 16 bytes: x, y, then two fixed filler words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconLocation {
    pub x: u32,
    pub y: u32,
}

impl IconLocation {
    const TRAILER: [u8; 8] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00];

    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Parse from a blob. Only the first 8 bytes are interpreted.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(bytes);
        let x = cursor.read_u32().ok()?;
        let y = cursor.read_u32().ok()?;
        Some(Self { x, y })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.x.to_be_bytes());
        out[4..8].copy_from_slice(&self.y.to_be_bytes());
        out[8..16].copy_from_slice(&Self::TRAILER);
        out
    }
}

/// Errors that can occur while decoding a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The type tag is not one of the known tags.
    UnknownType(FourCC),
    /// The payload was malformed.
    Decode(CursorError),
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(tag) => write!(f, "unknown value type '{tag}'"),
            Self::Decode(e) => write!(f, "malformed value: {e}"),
        }
    }
}

impl std::error::Error for ValueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::UnknownType(_) => None,
        }
    }
}

impl From<CursorError> for ValueError {
    fn from(e: CursorError) -> Self {
        Self::Decode(e)
    }
}
