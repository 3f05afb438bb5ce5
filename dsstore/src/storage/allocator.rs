//! Buddy allocator over the file's address space.
//!
//! The address space is `2^31` bytes, carved into power-of-two blocks. Each
//! width has a free list of block offsets kept in ascending order. Allocation
//! takes the lowest free block of the smallest sufficient width, splitting a
//! larger block when needed; the upper half of each split goes back onto the
//! next-lower free list. Releasing a block merges it with its buddy for as
//! long as the buddy is free.
//!
//! # Bookkeeping block layout
//!
//! ```text
//! u32                    n: address table length
//! u32                    unknown, always 0
//! [u32; pad256(n)]       packed block addresses, 0 for unused slots
//! directory              see `Directory`
//! 32 x (u32 count, [u32; count])  free lists by width
//! ```
//!
//! Block id 0 always refers to the bookkeeping block itself.

// Table lengths and offsets are bounded by the 31-bit address space.
#![allow(clippy::cast_possible_truncation)]

use crate::storage::block::{
    BlockAddress, BlockId, MAX_WIDTH, MIN_WIDTH, WIDTH_COUNT, width_for_len,
};
use crate::storage::directory::Directory;
use crate::types::cursor::{Cursor, CursorError, PutBigEndian};

/// The address table is stored padded to a multiple of this many entries.
const ADDRESS_PAGE: usize = 256;

/// Allocation state: address table, directory and free lists.
///
/// # Invariants
///
/// - Free blocks and allocated blocks never overlap.
/// - Every free list is sorted ascending and holds aligned offsets.
/// - The 32-byte header block at offset 0 is never free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyAllocator {
    addresses: Vec<Option<BlockAddress>>,
    directory: Directory,
    free_lists: Vec<Vec<u32>>,
}

impl BuddyAllocator {
    /// Allocator for an empty file: the whole space is free except the
    /// header block, and block 0 has no location yet.
    #[must_use]
    pub fn new() -> Self {
        let mut free_lists = vec![Vec::new(); WIDTH_COUNT];
        free_lists[MAX_WIDTH as usize].push(0);
        let mut allocator = Self {
            addresses: vec![None],
            directory: Directory::new(),
            free_lists,
        };
        // The whole space is free, so a 32-byte block is always available.
        let header = allocator.take(MIN_WIDTH);
        debug_assert_eq!(header, Some(0));
        allocator
    }

    /// Decode the bookkeeping block found at `root`.
    pub fn decode(bytes: &[u8], root: BlockAddress) -> Result<Self, AllocError> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u32()? as usize;
        let _unknown = cursor.read_u32()?;

        let padded = count.div_ceil(ADDRESS_PAGE) * ADDRESS_PAGE;
        let mut addresses = Vec::with_capacity(count);
        for slot in 0..padded {
            let raw = cursor.read_u32()?;
            if slot >= count {
                continue;
            }
            if raw == 0 {
                addresses.push(None);
                continue;
            }
            let addr = BlockAddress::from_raw(raw).ok_or_else(|| {
                AllocError::Corrupt(format!("block #{slot} has invalid address {raw:#x}"))
            })?;
            addresses.push(Some(addr));
        }

        match addresses.first().copied() {
            None => addresses.push(Some(root)),
            Some(None) => addresses[0] = Some(root),
            Some(Some(addr)) if addr == root => {}
            Some(Some(addr)) => {
                return Err(AllocError::Corrupt(format!(
                    "bookkeeping block listed at {addr}, header says {root}"
                )));
            }
        }

        let directory = Directory::decode(&mut cursor)?;

        let mut free_lists = Vec::with_capacity(WIDTH_COUNT);
        for width in 0..WIDTH_COUNT as u32 {
            let n = cursor.read_u32()? as usize;
            let mut list = Vec::with_capacity(n.min(cursor.remaining() / 4));
            for _ in 0..n {
                let offset = cursor.read_u32()?;
                if BlockAddress::new(offset, width).is_none() {
                    return Err(AllocError::Corrupt(format!(
                        "free offset {offset:#x} invalid for width {width}"
                    )));
                }
                list.push(offset);
            }
            list.sort_unstable();
            free_lists.push(list);
        }

        Ok(Self {
            addresses,
            directory,
            free_lists,
        })
    }

    /// Serialized size of the bookkeeping block in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let table = self.addresses.len().div_ceil(ADDRESS_PAGE) * ADDRESS_PAGE;
        let free: usize = self.free_lists.iter().map(|l| 4 + 4 * l.len()).sum();
        8 + 4 * table + self.directory.encoded_len() + free
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32(self.addresses.len() as u32);
        out.put_u32(0);
        let padded = self.addresses.len().div_ceil(ADDRESS_PAGE) * ADDRESS_PAGE;
        for slot in 0..padded {
            let raw = self
                .addresses
                .get(slot)
                .copied()
                .flatten()
                .map_or(0, BlockAddress::raw);
            out.put_u32(raw);
        }
        self.directory.encode(out);
        for list in &self.free_lists {
            out.put_u32(list.len() as u32);
            for &offset in list {
                out.put_u32(offset);
            }
        }
    }

    #[must_use]
    pub const fn directory(&self) -> &Directory {
        &self.directory
    }

    pub const fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    /// Look up where a block lives. Pure, no I/O.
    pub fn resolve(&self, id: BlockId) -> Result<BlockAddress, AllocError> {
        self.addresses
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(AllocError::UnknownBlock(id))
    }

    /// Number of slots in the address table, used or not.
    #[must_use]
    pub fn table_len(&self) -> usize {
        self.addresses.len()
    }

    /// Number of allocated blocks, including the bookkeeping block.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.addresses.iter().filter(|a| a.is_some()).count()
    }

    /// Free offsets of one width, ascending.
    #[must_use]
    pub fn free_list(&self, width: u32) -> &[u32] {
        self.free_lists.get(width as usize).map_or(&[], Vec::as_slice)
    }

    /// Allocate a block of at least `len` bytes.
    pub fn allocate(&mut self, len: u64) -> Result<BlockId, AllocError> {
        let addr = self.allocate_address(len)?;
        let slot = self
            .addresses
            .iter()
            .skip(1)
            .position(Option::is_none)
            .map(|i| i + 1);
        let id = match slot {
            Some(index) => {
                self.addresses[index] = Some(addr);
                index
            }
            None => {
                self.addresses.push(Some(addr));
                self.addresses.len() - 1
            }
        };
        Ok(BlockId(id as u32))
    }

    /// Return a block to the free lists.
    ///
    /// Releasing an id that is not currently allocated is an error.
    pub fn free(&mut self, id: BlockId) -> Result<(), AllocError> {
        let addr = self
            .addresses
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(AllocError::NotAllocated(id))?;
        self.release(addr.offset(), addr.width());
        Ok(())
    }

    /// Move block `id` to a fresh block of at least `len` bytes.
    ///
    /// The new block is taken before the old one is released, so the two
    /// never overlap and the old contents stay intact on disk until the
    /// caller overwrites whatever points at them.
    pub fn relocate(&mut self, id: BlockId, len: u64) -> Result<BlockAddress, AllocError> {
        let slot = self
            .addresses
            .get(id.index())
            .ok_or(AllocError::UnknownBlock(id))?;
        let old = *slot;
        if old.is_none() && id != BlockId::ROOT {
            return Err(AllocError::UnknownBlock(id));
        }
        let addr = self.allocate_address(len)?;
        self.addresses[id.index()] = Some(addr);
        if let Some(old) = old {
            self.release(old.offset(), old.width());
        }
        Ok(addr)
    }

    /// Move the bookkeeping block to a fresh block large enough for its own
    /// encoding.
    ///
    /// Moving changes the free lists and therefore the encoded size, so the
    /// block is moved again in the rare case the result no longer fits.
    pub fn relocate_root(&mut self) -> Result<BlockAddress, AllocError> {
        loop {
            let addr = self.relocate(BlockId::ROOT, self.encoded_len() as u64)?;
            if self.encoded_len() as u64 <= addr.len() {
                return Ok(addr);
            }
        }
    }

    fn allocate_address(&mut self, len: u64) -> Result<BlockAddress, AllocError> {
        let width = width_for_len(len).ok_or(AllocError::Overflow { len })?;
        let offset = self
            .take(width)
            .ok_or(AllocError::AddressSpaceExhausted { width })?;
        BlockAddress::new(offset, width)
            .ok_or_else(|| AllocError::Corrupt(format!("free offset {offset:#x} misaligned")))
    }

    /// Remove and return the lowest free offset of `width`, splitting the
    /// smallest larger block if that list is empty.
    fn take(&mut self, width: u32) -> Option<u32> {
        let source = (width as usize..WIDTH_COUNT).find(|&w| !self.free_lists[w].is_empty())?;
        let offset = self.free_lists[source].remove(0);
        for lower in (width as usize..source).rev() {
            insert_sorted(&mut self.free_lists[lower], offset + (1u32 << lower));
        }
        Some(offset)
    }

    fn release(&mut self, mut offset: u32, mut width: u32) {
        while width < MAX_WIDTH {
            let buddy = offset ^ (1u32 << width);
            let list = &mut self.free_lists[width as usize];
            match list.binary_search(&buddy) {
                Ok(index) => {
                    list.remove(index);
                    offset = offset.min(buddy);
                    width += 1;
                }
                Err(_) => break,
            }
        }
        insert_sorted(&mut self.free_lists[width as usize], offset);
    }
}

impl Default for BuddyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_sorted(list: &mut Vec<u32>, offset: u32) {
    let index = list.binary_search(&offset).unwrap_or_else(|i| i);
    list.insert(index, offset);
}

/// Errors that can occur in the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The requested length exceeds the largest block.
    Overflow { len: u64 },
    /// No free block of this width or larger remains.
    AddressSpaceExhausted { width: u32 },
    /// The block is not currently allocated.
    NotAllocated(BlockId),
    /// The id is not in the address table.
    UnknownBlock(BlockId),
    /// A directory name is longer than 255 bytes.
    NameTooLong(usize),
    /// The bookkeeping block is inconsistent.
    Corrupt(String),
    /// The bookkeeping block is truncated.
    Decode(CursorError),
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow { len } => write!(f, "allocation of {len} bytes exceeds 2^31"),
            Self::AddressSpaceExhausted { width } => {
                write!(f, "no free block of width {width} or larger")
            }
            Self::NotAllocated(id) => write!(f, "block {id} is not allocated"),
            Self::UnknownBlock(id) => write!(f, "unknown block {id}"),
            Self::NameTooLong(len) => {
                write!(f, "directory name is {len} bytes, limit is 255")
            }
            Self::Corrupt(msg) => write!(f, "corrupt allocator state: {msg}"),
            Self::Decode(e) => write!(f, "malformed bookkeeping block: {e}"),
        }
    }
}

impl std::error::Error for AllocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CursorError> for AllocError {
    fn from(e: CursorError) -> Self {
        Self::Decode(e)
    }
}
