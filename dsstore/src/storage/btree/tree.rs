//! B-tree operations over a session's node cache.
//!
//! The tree is described by a `TreeMeta` stored in the block named `DSDB`.
//! Descent and split propagation use an explicit path of
//! `(block, child index)` pairs rather than recursion.

#![allow(clippy::cast_possible_truncation)]

use std::mem;

use crate::storage::allocator::AllocError;
use crate::storage::block::BlockId;
use crate::storage::btree::cursor::Records;
use crate::storage::btree::node::{NODE_HEADER_LEN, Node};
use crate::storage::session::{Session, StorageError};
use crate::types::cursor::{Cursor, CursorError, PutBigEndian};
use crate::types::{FourCC, Record, Value};

/// Serialized size of the tree descriptor.
pub const DESCRIPTOR_LEN: usize = 20;

/// Largest encoded record a tree with this page size accepts.
///
/// Any node holding at most two such records fits in a page, so a node that
/// overflows always has at least three records and can be split with a
/// non-empty half on each side.
#[must_use]
pub const fn max_record_len(page_size: u32) -> usize {
    (page_size as usize - NODE_HEADER_LEN) / 2 - 4
}

/// The tree descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMeta {
    pub root: BlockId,
    /// Number of internal levels; 0 when the root is a leaf.
    pub levels: u32,
    pub records: u32,
    pub nodes: u32,
    pub page_size: u32,
}

impl TreeMeta {
    /// Allocate an empty leaf root and describe it.
    pub fn create(session: &mut Session, page_size: u32) -> Result<Self, BTreeError> {
        let root = session.allocate(u64::from(page_size))?;
        session.put_node(root, Node::default());
        Ok(Self {
            root,
            levels: 0,
            records: 0,
            nodes: 1,
            page_size,
        })
    }

    /// Tree height counting the leaf level.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.levels + 1
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = Cursor::new(bytes);
        Ok(Self {
            root: BlockId(cursor.read_u32()?),
            levels: cursor.read_u32()?,
            records: cursor.read_u32()?,
            nodes: cursor.read_u32()?,
            page_size: cursor.read_u32()?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DESCRIPTOR_LEN);
        out.put_u32(self.root.0);
        out.put_u32(self.levels);
        out.put_u32(self.records);
        out.put_u32(self.nodes);
        out.put_u32(self.page_size);
        out
    }
}

/// Shape of a tree as measured by `BTree::verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub records: u32,
    pub nodes: u32,
    pub leaves: u32,
    pub levels: u32,
}

/// A B-tree bound to a session.
pub struct BTree<'a> {
    session: &'a mut Session,
    meta: &'a mut TreeMeta,
}

impl<'a> BTree<'a> {
    pub const fn new(session: &'a mut Session, meta: &'a mut TreeMeta) -> Self {
        Self { session, meta }
    }

    #[must_use]
    pub const fn meta(&self) -> &TreeMeta {
        self.meta
    }

    /// Insert a record, replacing the value of an existing record with the
    /// same key.
    ///
    /// Returns the previous value for a replacement.
    ///
    /// # Post-conditions
    ///
    /// Every node on the insertion path fits in a page. Splits propagate at
    /// most `height` times; a root split raises `levels` by one.
    pub fn insert(&mut self, record: Record) -> Result<Option<Value>, BTreeError> {
        let len = record.encoded_len();
        let max = max_record_len(self.meta.page_size);
        if len > max {
            return Err(BTreeError::RecordTooLarge { len, max });
        }

        let mut path: Vec<(BlockId, usize)> = Vec::new();
        let mut id = self.meta.root;
        let (index, replaced) = loop {
            if path.len() > self.meta.levels as usize {
                return Err(BTreeError::Corruption(format!(
                    "descended past {} levels",
                    self.meta.levels
                )));
            }
            let node = self.session.node(id)?;
            match node.search(&record.filename, record.code) {
                Ok(index) => {
                    let node = self.session.node_mut(id)?;
                    break (index, Some(mem::replace(&mut node.records[index], record)));
                }
                Err(index) if node.is_leaf() => {
                    if path.len() != self.meta.levels as usize {
                        return Err(BTreeError::Corruption(format!(
                            "leaf {id} at depth {}, expected {}",
                            path.len(),
                            self.meta.levels
                        )));
                    }
                    self.session.node_mut(id)?.records.insert(index, record);
                    break (index, None);
                }
                Err(index) => {
                    let child = child_at(node, id, index)?;
                    path.push((id, index));
                    id = child;
                }
            }
        };

        let nodes_before = self.meta.nodes;
        if let Err(e) = self.split_overflowing(id, path) {
            if self.meta.nodes == nodes_before {
                // Nothing was split, so the change can be taken back.
                let node = self.session.node_mut(id)?;
                match replaced {
                    Some(old) => node.records[index] = old,
                    None => {
                        node.records.remove(index);
                    }
                }
            } else if replaced.is_none() {
                self.meta.records += 1;
            }
            return Err(e);
        }
        match replaced {
            Some(old) => Ok(Some(old.value)),
            None => {
                self.meta.records += 1;
                Ok(None)
            }
        }
    }

    /// Split `id` and its ancestors until every node on `path` fits.
    ///
    /// Each split allocates its blocks before touching any node, so a failed
    /// allocation leaves the tree as it was before that split.
    fn split_overflowing(
        &mut self,
        mut id: BlockId,
        mut path: Vec<(BlockId, usize)>,
    ) -> Result<(), BTreeError> {
        let page_size = self.meta.page_size as usize;
        loop {
            let node = self.session.node(id)?;
            let len = node.encoded_len();
            if len <= page_size {
                return Ok(());
            }
            let index = node.split_index().ok_or_else(|| {
                BTreeError::Corruption(format!("node {id} overflows with fewer than 3 records"))
            })?;

            let parent = path.pop();
            let right_id = self.session.allocate(page_size as u64)?;
            let new_root = if parent.is_none() {
                match self.session.allocate(page_size as u64) {
                    Ok(root) => Some(root),
                    Err(e) => {
                        self.session.allocator_mut().free(right_id)?;
                        return Err(e.into());
                    }
                }
            } else {
                None
            };

            let (separator, right) = self.session.node_mut(id)?.split_at(index);
            tracing::debug!(
                node = %id,
                right = %right_id,
                len,
                index,
                leaf = right.is_leaf(),
                "split node"
            );
            self.session.put_node(right_id, right);
            self.meta.nodes += 1;

            let Some((parent_id, slot)) = parent else {
                let new_root = new_root.ok_or_else(|| {
                    BTreeError::Corruption("root split without a new root block".to_string())
                })?;
                self.session
                    .put_node(new_root, Node::internal(vec![separator], vec![id, right_id]));
                self.meta.root = new_root;
                self.meta.levels += 1;
                self.meta.nodes += 1;
                tracing::debug!(root = %new_root, levels = self.meta.levels, "grew root");
                return Ok(());
            };
            let parent = self.session.node_mut(parent_id)?;
            parent.records.insert(slot, separator);
            parent.children.insert(slot + 1, right_id);
            id = parent_id;
        }
    }

    /// All records in key order.
    pub fn iter(&mut self) -> Records<'_> {
        Records::new(self.session, *self.meta, String::new(), None, false)
    }

    /// Records whose filename matches `filename` case-insensitively,
    /// restricted to `code` when given, in key order.
    pub fn find(&mut self, filename: &str, code: Option<FourCC>) -> Records<'_> {
        Records::new(self.session, *self.meta, filename.to_string(), code, true)
    }

    /// Look up a single record.
    pub fn get(&mut self, filename: &str, code: FourCC) -> Result<Option<Record>, BTreeError> {
        self.find(filename, Some(code)).next().transpose()
    }

    /// Walk the whole tree and check its structural invariants.
    ///
    /// Checks key order within and across nodes, uniform leaf depth, node
    /// sizes, child counts, and that the descriptor counters match.
    pub fn verify(&mut self) -> Result<TreeStats, BTreeError> {
        struct Pending {
            id: BlockId,
            depth: u32,
            lower: Option<Record>,
            upper: Option<Record>,
        }

        let mut stats = TreeStats {
            records: 0,
            nodes: 0,
            leaves: 0,
            levels: self.meta.levels,
        };
        let mut stack = vec![Pending {
            id: self.meta.root,
            depth: 0,
            lower: None,
            upper: None,
        }];
        let page_size = self.meta.page_size as usize;

        while let Some(Pending {
            id,
            depth,
            lower,
            upper,
        }) = stack.pop()
        {
            if depth > self.meta.levels {
                return Err(BTreeError::Corruption(format!(
                    "node {id} below the leaf level"
                )));
            }
            let node = self.session.node(id)?;
            stats.nodes += 1;
            stats.records += node.records.len() as u32;

            let len = node.encoded_len();
            if len > page_size {
                return Err(BTreeError::Corruption(format!(
                    "node {id} is {len} bytes, page size is {page_size}"
                )));
            }
            if node.records.is_empty() && id != self.meta.root {
                return Err(BTreeError::Corruption(format!("node {id} is empty")));
            }
            let in_order = node
                .records
                .windows(2)
                .all(|pair| pair[0].cmp_record(&pair[1]).is_lt());
            let above_lower = match (&lower, node.records.first()) {
                (Some(bound), Some(first)) => bound.cmp_record(first).is_lt(),
                _ => true,
            };
            let below_upper = match (&upper, node.records.last()) {
                (Some(bound), Some(last)) => last.cmp_record(bound).is_lt(),
                _ => true,
            };
            if !(in_order && above_lower && below_upper) {
                return Err(BTreeError::Corruption(format!("node {id} is out of order")));
            }

            if node.is_leaf() {
                if depth != self.meta.levels {
                    return Err(BTreeError::Corruption(format!(
                        "leaf {id} at depth {depth}, expected {}",
                        self.meta.levels
                    )));
                }
                stats.leaves += 1;
                continue;
            }
            if node.children.len() != node.records.len() + 1 {
                return Err(BTreeError::Corruption(format!(
                    "node {id} has {} children for {} records",
                    node.children.len(),
                    node.records.len()
                )));
            }
            for (index, &child) in node.children.iter().enumerate() {
                let child_lower = if index == 0 {
                    lower.clone()
                } else {
                    Some(node.records[index - 1].clone())
                };
                let child_upper = node.records.get(index).cloned().or_else(|| upper.clone());
                stack.push(Pending {
                    id: child,
                    depth: depth + 1,
                    lower: child_lower,
                    upper: child_upper,
                });
            }
        }

        if stats.records != self.meta.records || stats.nodes != self.meta.nodes {
            return Err(BTreeError::Corruption(format!(
                "descriptor counts {} records in {} nodes, tree has {} in {}",
                self.meta.records, self.meta.nodes, stats.records, stats.nodes
            )));
        }
        Ok(stats)
    }
}

/// Child `index` of an internal node, validated.
pub(crate) fn child_at(node: &Node, id: BlockId, index: usize) -> Result<BlockId, BTreeError> {
    node.children.get(index).copied().ok_or_else(|| {
        BTreeError::Corruption(format!("node {id} has no child {index}"))
    })
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// Storage error.
    Storage(StorageError),
    /// The record cannot fit in a node with room for a split.
    RecordTooLarge { len: usize, max: usize },
    /// Bulk load input is not strictly ascending at `index`.
    UnsortedBulkLoad { index: usize },
    /// The tree structure is inconsistent.
    Corruption(String),
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::RecordTooLarge { len, max } => {
                write!(f, "record is {len} bytes, limit is {max}")
            }
            Self::UnsortedBulkLoad { index } => {
                write!(f, "bulk load input out of order at record {index}")
            }
            Self::Corruption(msg) => write!(f, "corrupt tree: {msg}"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BTreeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<AllocError> for BTreeError {
    fn from(e: AllocError) -> Self {
        Self::Storage(StorageError::Alloc(e))
    }
}
