//! Records: one `(filename, code, value)` entry of the store.
//!
//! # Wire format
//!
//! ```text
//! u32            filename length in UTF-16 code units
//! [u16; len]     filename, UTF-16BE
//! [u8; 4]        attribute code
//! [u8; 4]        type tag
//! ...            payload (see `Value`)
//! ```
//!
//! Records sort by filename (case-insensitive) and then by code. Two records
//! with the same folded filename and code occupy the same slot in the tree.

use std::cmp::Ordering;

use crate::types::cursor::{Cursor, PutBigEndian, utf16_len};
use crate::types::value::{Value, ValueError};
use crate::types::FourCC;

/// Compare two filenames the way the tree orders them.
#[must_use]
pub fn compare_filenames(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// A single stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub filename: String,
    pub code: FourCC,
    pub value: Value,
}

impl Record {
    #[must_use]
    pub fn new(filename: impl Into<String>, code: FourCC, value: Value) -> Self {
        Self {
            filename: filename.into(),
            code,
            value,
        }
    }

    /// Order this record against a search key.
    #[must_use]
    pub fn cmp_key(&self, filename: &str, code: FourCC) -> Ordering {
        compare_filenames(&self.filename, filename).then(self.code.cmp(&code))
    }

    /// Order two records by key, ignoring values.
    #[must_use]
    pub fn cmp_record(&self, other: &Self) -> Ordering {
        self.cmp_key(&other.filename, other.code)
    }

    /// Whether this record belongs to `filename` (case-insensitive).
    #[must_use]
    pub fn matches_filename(&self, filename: &str) -> bool {
        compare_filenames(&self.filename, filename) == Ordering::Equal
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        4 + 2 * utf16_len(&self.filename) + 8 + self.value.encoded_len()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32(utf16_len(&self.filename) as u32);
        out.put_utf16(&self.filename);
        out.extend_from_slice(self.code.as_bytes());
        out.extend_from_slice(self.value.type_tag().as_bytes());
        self.value.encode(out);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, ValueError> {
        let units = cursor.read_u32()? as usize;
        let filename = cursor.read_utf16(units)?;
        let code = cursor.read_four_cc()?;
        let tag = cursor.read_four_cc()?;
        let value = Value::decode(tag, cursor)?;
        Ok(Self {
            filename,
            code,
            value,
        })
    }
}
