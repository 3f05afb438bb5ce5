//! File prefix and allocator header.
//!
//! # Layout
//!
//! ```text
//! file 0..4     00 00 00 01              prefix, outside the address space
//! addr 0..4     "Bud1"                   magic
//! addr 4..8     bookkeeping offset
//! addr 8..12    bookkeeping size
//! addr 12..16   bookkeeping offset       (copy, must match)
//! addr 16..32   reserved                 (preserved as read)
//! ```
//!
//! The header occupies the 32-byte block at address 0, which the allocator
//! never hands out.

use crate::storage::block::BlockAddress;

/// Bytes before address 0.
pub const PREFIX: [u8; 4] = [0, 0, 0, 1];

/// Magic identifying the allocator format.
pub const MAGIC: [u8; 4] = *b"Bud1";

/// Header size in the address space.
pub const HEADER_LEN: usize = 32;

/// Prefix plus header, the bytes read to open a file.
pub const FILE_HEADER_LEN: usize = PREFIX.len() + HEADER_LEN;

/// Parsed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Location of the bookkeeping block.
    pub root: BlockAddress,
    /// Opaque trailing bytes, written back unchanged.
    pub reserved: [u8; 16],
}

impl Header {
    #[must_use]
    pub const fn new(root: BlockAddress) -> Self {
        Self {
            root,
            reserved: [0; 16],
        }
    }

    /// Parse the prefix and header from the first 36 bytes of a file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < FILE_HEADER_LEN {
            return Err(HeaderError::Truncated(bytes.len()));
        }
        let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        if bytes[0..4] != PREFIX {
            return Err(HeaderError::BadPrefix(word(0)));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[4..8]);
        if magic != MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }

        let offset = word(8);
        let size = word(12);
        let offset_copy = word(16);
        if offset != offset_copy {
            return Err(HeaderError::MismatchedRootOffset {
                first: offset,
                second: offset_copy,
            });
        }
        let root = if size.is_power_of_two() {
            BlockAddress::new(offset, size.trailing_zeros())
        } else {
            None
        }
        .ok_or(HeaderError::InvalidRootBlock { offset, size })?;

        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&bytes[20..36]);
        Ok(Self { root, reserved })
    }

    /// Serialize the prefix and header.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_LEN] {
        let mut out = [0u8; FILE_HEADER_LEN];
        out[0..4].copy_from_slice(&PREFIX);
        out[4..8].copy_from_slice(&MAGIC);
        out[8..12].copy_from_slice(&self.root.offset().to_be_bytes());
        // Width is at most 31, so the size fits in u32.
        out[12..16].copy_from_slice(&(self.root.len() as u32).to_be_bytes());
        out[16..20].copy_from_slice(&self.root.offset().to_be_bytes());
        out[20..36].copy_from_slice(&self.reserved);
        out
    }
}

/// Errors that make a header unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// File shorter than prefix plus header.
    Truncated(usize),
    /// The 4-byte prefix is not `00 00 00 01`.
    BadPrefix(u32),
    /// Magic is not "Bud1".
    BadMagic([u8; 4]),
    /// The two copies of the bookkeeping offset differ.
    MismatchedRootOffset { first: u32, second: u32 },
    /// Bookkeeping size is not a valid block size for its offset.
    InvalidRootBlock { offset: u32, size: u32 },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated(len) => {
                write!(f, "file too short for header: {len} bytes")
            }
            Self::BadPrefix(word) => write!(f, "bad file prefix: {word:#010x}"),
            Self::BadMagic(magic) => write!(f, "bad magic: {magic:02x?}"),
            Self::MismatchedRootOffset { first, second } => write!(
                f,
                "bookkeeping offset copies differ: {first:#x} vs {second:#x}"
            ),
            Self::InvalidRootBlock { offset, size } => write!(
                f,
                "invalid bookkeeping block: offset {offset:#x}, size {size}"
            ),
        }
    }
}

impl std::error::Error for HeaderError {}
