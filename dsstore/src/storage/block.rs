//! Block identifiers and packed block addresses.
//!
//! A block of `2^w` bytes starting at `offset` is addressed on disk by the
//! single word `offset | w`. Because blocks are aligned to their own size and
//! never smaller than 32 bytes, the low 5 bits of the offset are always zero
//! and can carry the width.

use std::fmt;

/// Smallest block width: 32 bytes.
pub const MIN_WIDTH: u32 = 5;

/// Largest block width: 2 GiB.
pub const MAX_WIDTH: u32 = 31;

/// Number of distinct widths (and free lists).
pub const WIDTH_COUNT: usize = 32;

const WIDTH_MASK: u32 = 0x1f;

/// Index of a block in the allocator's address table.
///
/// Block 0 is the allocator's own bookkeeping block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The bookkeeping block.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A packed `(offset, width)` pair.
///
/// # Invariants
///
/// - `MIN_WIDTH <= width <= MAX_WIDTH`
/// - `offset` is a multiple of `2^width`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockAddress(u32);

impl BlockAddress {
    /// Build an address, checking the invariants.
    #[must_use]
    pub const fn new(offset: u32, width: u32) -> Option<Self> {
        if width < MIN_WIDTH || width > MAX_WIDTH {
            return None;
        }
        if offset & ((1 << width) - 1) != 0 {
            return None;
        }
        Some(Self(offset | width))
    }

    /// Decode a raw address word. Zero (an unused table slot) and words that
    /// violate the invariants yield `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Self::new(raw & !WIDTH_MASK, raw & WIDTH_MASK)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Byte offset relative to the start of the address space.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0 & !WIDTH_MASK
    }

    /// log2 of the block size.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.0 & WIDTH_MASK
    }

    /// Block size in bytes.
    #[must_use]
    pub const fn len(self) -> u64 {
        1u64 << self.width()
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{}", self.offset(), self.len())
    }
}

/// Smallest width whose block holds `len` bytes, or `None` when no block is
/// large enough.
#[must_use]
pub const fn width_for_len(len: u64) -> Option<u32> {
    let width = if len <= 1 {
        0
    } else {
        u64::BITS - (len - 1).leading_zeros()
    };
    let width = if width < MIN_WIDTH { MIN_WIDTH } else { width };
    if width > MAX_WIDTH { None } else { Some(width) }
}
