//! Bounds-checked big-endian reader over a byte slice.
//!
//! Every on-disk structure in the file is big-endian. Decoders read through
//! a `Cursor` so that truncated or corrupt input surfaces as an error instead
//! of a slice-index panic.

use crate::types::FourCC;

/// A forward-only reader over a borrowed byte slice.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        if len > self.remaining() {
            return Err(CursorError::Truncated {
                position: self.position,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_four_cc(&mut self) -> Result<FourCC, CursorError> {
        Ok(FourCC(self.read_array()?))
    }

    /// Read `units` UTF-16BE code units and decode them.
    pub fn read_utf16(&mut self, units: usize) -> Result<String, CursorError> {
        let start = self.position;
        let byte_len = units.checked_mul(2).ok_or(CursorError::Truncated {
            position: start,
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        let bytes = self.read_bytes(byte_len)?;
        let code_units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        char::decode_utf16(code_units)
            .collect::<Result<String, _>>()
            .map_err(|_| CursorError::InvalidUtf16 { position: start })
    }
}

/// Append helpers for big-endian encoding.
pub trait PutBigEndian {
    fn put_u32(&mut self, value: u32);
    fn put_u64(&mut self, value: u64);
    /// Append `text` as UTF-16BE code units (no length prefix).
    fn put_utf16(&mut self, text: &str);
}

impl PutBigEndian for Vec<u8> {
    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_utf16(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            self.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

/// Number of UTF-16 code units needed to encode `text`.
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Errors produced while decoding bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// Input ended before a field was complete.
    Truncated {
        position: usize,
        needed: usize,
        remaining: usize,
    },
    /// UTF-16 text contained an unpaired surrogate.
    InvalidUtf16 { position: usize },
}

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated {
                position,
                needed,
                remaining,
            } => write!(
                f,
                "truncated input at byte {position}: needed {needed}, {remaining} remaining"
            ),
            Self::InvalidUtf16 { position } => {
                write!(f, "invalid UTF-16 text at byte {position}")
            }
        }
    }
}

impl std::error::Error for CursorError {}
