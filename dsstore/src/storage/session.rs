//! Per-open state: file handle, allocator and node cache.
//!
//! Nodes are decoded on first access and kept in memory. Mutated nodes are
//! tracked as dirty and written back on `commit`, which then moves the
//! bookkeeping block to a fresh location, writes it, and finally points the
//! header at it.

use std::collections::{BTreeSet, HashMap, hash_map::Entry};
use std::path::Path;

use crate::storage::allocator::{AllocError, BuddyAllocator};
use crate::storage::block::{BlockAddress, BlockId};
use crate::storage::btree::{Node, NodeError};
use crate::storage::file::{BlockStore, FileError};
use crate::storage::header::Header;

pub struct Session {
    file: BlockStore,
    allocator: BuddyAllocator,
    /// Reserved header bytes to write back on commit.
    reserved: [u8; 16],
    nodes: HashMap<BlockId, Node>,
    dirty: BTreeSet<BlockId>,
}

impl Session {
    /// Start a session on a new, empty file.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            file: BlockStore::create(path)?,
            allocator: BuddyAllocator::new(),
            reserved: [0; 16],
            nodes: HashMap::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Open an existing file and load its allocator state.
    pub fn open(path: &Path, writable: bool) -> Result<Self, StorageError> {
        let mut file = BlockStore::open(path, writable)?;
        let header = file.read_header()?;
        let bytes = file.read_block(header.root)?;
        let allocator = BuddyAllocator::decode(&bytes, header.root)?;
        tracing::debug!(
            root = %header.root,
            blocks = allocator.allocated_count(),
            "loaded allocator"
        );
        Ok(Self {
            file,
            allocator,
            reserved: header.reserved,
            nodes: HashMap::new(),
            dirty: BTreeSet::new(),
        })
    }

    #[must_use]
    pub const fn allocator(&self) -> &BuddyAllocator {
        &self.allocator
    }

    pub const fn allocator_mut(&mut self) -> &mut BuddyAllocator {
        &mut self.allocator
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.file.is_writable()
    }

    /// Whether any node changed since the last commit.
    #[must_use]
    pub fn has_dirty_nodes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Allocate a block of at least `len` bytes.
    pub fn allocate(&mut self, len: u64) -> Result<BlockId, StorageError> {
        Ok(self.allocator.allocate(len)?)
    }

    /// Length in bytes of a block.
    pub fn block_len(&self, id: BlockId) -> Result<u64, StorageError> {
        Ok(self.allocator.resolve(id)?.len())
    }

    /// Read the raw contents of a block.
    pub fn read_block(&mut self, id: BlockId) -> Result<Vec<u8>, StorageError> {
        let addr = self.allocator.resolve(id)?;
        Ok(self.file.read_block(addr)?)
    }

    /// Write raw contents to a block immediately.
    pub fn write_block(&mut self, id: BlockId, data: &[u8]) -> Result<(), StorageError> {
        let addr = self.allocator.resolve(id)?;
        Ok(self.file.write_block(addr, data)?)
    }

    /// Get a node, loading it from disk if needed.
    pub fn node(&mut self, id: BlockId) -> Result<&Node, StorageError> {
        self.load(id).map(|node| &*node)
    }

    /// Get a node for modification. It is written back on the next commit.
    pub fn node_mut(&mut self, id: BlockId) -> Result<&mut Node, StorageError> {
        self.load(id)?;
        self.dirty.insert(id);
        self.nodes.get_mut(&id).ok_or_else(|| {
            StorageError::Corruption(format!("node {id} missing from cache after load"))
        })
    }

    /// Store a node in the cache, replacing whatever the block held.
    pub fn put_node(&mut self, id: BlockId, node: Node) {
        self.nodes.insert(id, node);
        self.dirty.insert(id);
    }

    fn load(&mut self, id: BlockId) -> Result<&mut Node, StorageError> {
        match self.nodes.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if id == BlockId::ROOT {
                    return Err(StorageError::Corruption(
                        "node reference to the bookkeeping block".to_string(),
                    ));
                }
                let addr = self.allocator.resolve(id)?;
                let bytes = self.file.read_block(addr)?;
                let node = Node::decode(&bytes).map_err(|source| StorageError::Node { id, source })?;
                Ok(entry.insert(node))
            }
        }
    }

    /// Persist dirty nodes and allocator state, then sync.
    ///
    /// # Post-conditions
    ///
    /// The header points at a bookkeeping block that was written after every
    /// node it describes.
    pub fn commit(&mut self) -> Result<(), StorageError> {
        let mut written = 0usize;
        for &id in &self.dirty {
            let node = self.nodes.get(&id).ok_or_else(|| {
                StorageError::Corruption(format!("dirty node {id} missing from cache"))
            })?;
            let bytes = node.to_bytes();
            let mut addr = self.allocator.resolve(id)?;
            if bytes.len() as u64 > addr.len() {
                // Blocks written by other tools may be smaller than a page.
                addr = self.allocator.relocate(id, bytes.len() as u64)?;
            }
            self.file.write_block(addr, &bytes)?;
            written += 1;
        }

        let root = self.allocator.relocate_root()?;
        let mut bytes = Vec::with_capacity(self.allocator.encoded_len());
        self.allocator.encode(&mut bytes);
        self.file.write_block(root, &bytes)?;

        self.file.write_header(&Header {
            root,
            reserved: self.reserved,
        })?;
        self.file.sync()?;
        self.dirty.clear();

        tracing::debug!(nodes = written, root = %root, "committed");
        Ok(())
    }

    /// Location of the bookkeeping block, once committed.
    #[must_use]
    pub fn root_address(&self) -> Option<BlockAddress> {
        self.allocator.resolve(BlockId::ROOT).ok()
    }
}

/// Errors that can occur below the tree level.
#[derive(Debug)]
pub enum StorageError {
    /// File I/O or header error.
    File(FileError),
    /// Allocator error.
    Alloc(AllocError),
    /// A node failed to decode.
    Node { id: BlockId, source: NodeError },
    /// Inconsistent in-memory or on-disk state.
    Corruption(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(e) => write!(f, "file error: {e}"),
            Self::Alloc(e) => write!(f, "allocator error: {e}"),
            Self::Node { id, source } => write!(f, "node {id}: {source}"),
            Self::Corruption(msg) => write!(f, "corruption: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(e) => Some(e),
            Self::Alloc(e) => Some(e),
            Self::Node { source, .. } => Some(source),
            Self::Corruption(_) => None,
        }
    }
}

impl From<FileError> for StorageError {
    fn from(e: FileError) -> Self {
        Self::File(e)
    }
}

impl From<AllocError> for StorageError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}
