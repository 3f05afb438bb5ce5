//! Named entry points into the allocator.
//!
//! The bookkeeping block maps short names to block ids. A store has a single
//! entry, `DSDB`, pointing at the tree descriptor.

use std::collections::BTreeMap;

use crate::storage::allocator::AllocError;
use crate::storage::block::BlockId;
use crate::types::cursor::{Cursor, PutBigEndian};

/// Directory name of the tree descriptor.
pub const TREE_ENTRY: &str = "DSDB";

/// Longest permitted name, since its length is stored in one byte.
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: BTreeMap<Vec<u8>, BlockId>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<BlockId> {
        self.entries.get(name.as_bytes()).copied()
    }

    /// Bind `name` to `id`, replacing any previous binding.
    pub fn insert(&mut self, name: &str, id: BlockId) -> Result<(), AllocError> {
        if name.len() > MAX_NAME_LEN {
            return Err(AllocError::NameTooLong(name.len()));
        }
        self.entries.insert(name.as_bytes().to_vec(), id);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        4 + self
            .entries
            .keys()
            .map(|name| 1 + name.len() + 4)
            .sum::<usize>()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32(self.entries.len() as u32);
        for (name, id) in &self.entries {
            // Length checked on insert.
            out.push(name.len() as u8);
            out.extend_from_slice(name);
            out.put_u32(id.0);
        }
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, AllocError> {
        let count = cursor.read_u32()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let len = usize::from(cursor.read_u8()?);
            let name = cursor.read_bytes(len)?.to_vec();
            let id = BlockId(cursor.read_u32()?);
            entries.insert(name, id);
        }
        Ok(Self { entries })
    }
}
