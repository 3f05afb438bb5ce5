//! B-tree node layout and in-memory operations.
//!
//! # Layout
//!
//! ```text
//! u32     P: 0 for a leaf, otherwise the rightmost child id
//! u32     record count n
//! n x     [u32 left child id, internal only] record
//! ```
//!
//! An internal node with `n` records has `n + 1` children: the left child of
//! each record, then `P`.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::block::BlockId;
use crate::types::cursor::{Cursor, CursorError, PutBigEndian};
use crate::types::value::ValueError;
use crate::types::{FourCC, Record};

/// Bytes taken by `P` and the record count.
pub const NODE_HEADER_LEN: usize = 8;

/// A decoded node.
///
/// # Invariants
///
/// - Leaf: `children` is empty.
/// - Internal: `children.len() == records.len() + 1` and no child is block 0.
/// - `records` is strictly ascending by key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub records: Vec<Record>,
    pub children: Vec<BlockId>,
}

impl Node {
    /// A leaf holding `records`.
    #[must_use]
    pub const fn leaf(records: Vec<Record>) -> Self {
        Self {
            records,
            children: Vec::new(),
        }
    }

    /// An internal node. `children` must hold one more entry than `records`.
    #[must_use]
    pub fn internal(records: Vec<Record>, children: Vec<BlockId>) -> Self {
        debug_assert_eq!(children.len(), records.len() + 1);
        Self { records, children }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        let mut cursor = Cursor::new(bytes);
        let rightmost = cursor.read_u32()?;
        let count = cursor.read_u32()? as usize;

        // Each record needs at least 12 bytes, which bounds a corrupt count.
        let mut records = Vec::with_capacity(count.min(cursor.remaining() / 12));
        let mut children = Vec::new();
        for index in 0..count {
            if rightmost != 0 {
                let child = cursor.read_u32()?;
                if child == 0 {
                    return Err(NodeError::ZeroChild { index });
                }
                children.push(BlockId(child));
            }
            records.push(Record::decode(&mut cursor)?);
        }
        if rightmost != 0 {
            children.push(BlockId(rightmost));
        }
        Ok(Self { records, children })
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let child_words = if self.is_leaf() { 0 } else { 4 * self.records.len() };
        NODE_HEADER_LEN + child_words + self.records.iter().map(Record::encoded_len).sum::<usize>()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32(self.children.last().map_or(0, |id| id.0));
        out.put_u32(self.records.len() as u32);
        for (index, record) in self.records.iter().enumerate() {
            if !self.is_leaf()
                && let Some(child) = self.children.get(index)
            {
                out.put_u32(child.0);
            }
            record.encode(out);
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }

    /// Binary search for a key: `Ok` with the matching index or `Err` with
    /// the insertion point.
    pub fn search(&self, filename: &str, code: FourCC) -> Result<usize, usize> {
        self.records
            .binary_search_by(|record| record.cmp_key(filename, code))
    }

    /// Index of the record to promote when this node overflows.
    ///
    /// Picks the first record at which the running byte total passes half of
    /// the node, then clamps so both halves keep at least one record.
    /// Returns `None` for nodes with fewer than three records, which cannot
    /// be split.
    #[must_use]
    pub fn split_index(&self) -> Option<usize> {
        let n = self.records.len();
        if n < 3 {
            return None;
        }
        let overhead = if self.is_leaf() { 0 } else { 4 };
        let weights: Vec<usize> = self
            .records
            .iter()
            .map(|r| r.encoded_len() + overhead)
            .collect();
        let total: usize = weights.iter().sum();

        let mut running = 0;
        let mut index = n - 1;
        for (i, weight) in weights.iter().enumerate() {
            running += weight;
            if running * 2 > total {
                index = i;
                break;
            }
        }
        Some(index.clamp(1, n - 2))
    }

    /// Split at `index`: this node keeps records before it, the record at
    /// `index` is returned for promotion, and the rest form a new node.
    ///
    /// # Pre-conditions
    ///
    /// `1 <= index <= records.len() - 2`.
    #[must_use]
    pub fn split_at(&mut self, index: usize) -> (Record, Self) {
        let right_records = self.records.split_off(index + 1);
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(index + 1)
        };
        // `split_off` left exactly `index + 1` records behind.
        let separator = self.records.swap_remove(index);
        let right = Self {
            records: right_records,
            children: right_children,
        };
        (separator, right)
    }
}

/// Errors that can occur when decoding a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node header was truncated.
    Decode(CursorError),
    /// A record failed to decode.
    Record(ValueError),
    /// An internal node points at block 0.
    ZeroChild { index: usize },
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "malformed node: {e}"),
            Self::Record(e) => write!(f, "malformed record: {e}"),
            Self::ZeroChild { index } => {
                write!(f, "child {index} points at the bookkeeping block")
            }
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Record(e) => Some(e),
            Self::ZeroChild { .. } => None,
        }
    }
}

impl From<CursorError> for NodeError {
    fn from(e: CursorError) -> Self {
        Self::Decode(e)
    }
}

impl From<ValueError> for NodeError {
    fn from(e: ValueError) -> Self {
        Self::Record(e)
    }
}
