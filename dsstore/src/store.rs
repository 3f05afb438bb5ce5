//! The public store handle.
//!
//! A `Store` owns one open session on a `.DS_Store` file. All changes are
//! buffered in memory and reach the disk on `flush`, `close` or drop.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, StoreConfig};
use crate::storage::allocator::AllocError;
use crate::storage::block::BlockId;
use crate::storage::btree::{
    BTree, BTreeError, DESCRIPTOR_LEN, Records, TreeMeta, TreeStats, bulk_load,
};
use crate::storage::directory::TREE_ENTRY;
use crate::storage::session::{Session, StorageError};
use crate::types::{CursorError, FourCC, Record, Value};

/// How to open a store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file; mutations fail with `StoreError::ReadOnly`.
    ReadOnly,
    /// Create a new empty store, truncating any existing file.
    Create,
    /// Open an existing file for reading and writing.
    ReadWrite,
}

/// An open `.DS_Store` file.
///
/// # Invariants
///
/// - `meta` mirrors the descriptor block plus every buffered change.
/// - `modified` is set whenever the session or descriptor has unflushed
///   changes.
pub struct Store {
    session: Session,
    meta: TreeMeta,
    meta_id: BlockId,
    path: PathBuf,
    writable: bool,
    modified: bool,
}

impl Store {
    /// Open or create a store. New stores take their configuration from
    /// the environment, see `StoreConfig::from_env`.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, StoreError> {
        let config = match mode {
            OpenMode::Create => StoreConfig::from_env()?,
            OpenMode::ReadOnly | OpenMode::ReadWrite => StoreConfig::default(),
        };
        Self::open_with_config(path, mode, &config)
    }

    /// Open or create a store. `config` applies only to `OpenMode::Create`.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: OpenMode,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        match mode {
            OpenMode::Create => Self::create(path, config, Vec::new()),
            OpenMode::ReadOnly => Self::load(path, false),
            OpenMode::ReadWrite => Self::load(path, true),
        }
    }

    /// Create a new store holding `entries`, which must be sorted by
    /// filename (case-insensitive) and code without duplicates.
    ///
    /// The tree is built bottom-up, which is much faster than inserting one
    /// record at a time.
    pub fn create_with_entries(
        path: impl AsRef<Path>,
        config: &StoreConfig,
        entries: impl IntoIterator<Item = Record>,
    ) -> Result<Self, StoreError> {
        Self::create(path.as_ref(), config, entries.into_iter().collect())
    }

    fn create(path: &Path, config: &StoreConfig, records: Vec<Record>) -> Result<Self, StoreError> {
        if !StoreConfig::is_valid_page_size(config.page_size) {
            return Err(StoreError::InvalidPageSize(config.page_size));
        }
        let mut session = Session::create(path)?;
        let meta_id = session.allocate(DESCRIPTOR_LEN as u64)?;
        session
            .allocator_mut()
            .directory_mut()
            .insert(TREE_ENTRY, meta_id)?;
        let meta = if records.is_empty() {
            TreeMeta::create(&mut session, config.page_size)?
        } else {
            bulk_load(&mut session, config.page_size, records)?
        };

        let mut store = Self {
            session,
            meta,
            meta_id,
            path: path.to_path_buf(),
            writable: true,
            modified: true,
        };
        store.flush()?;
        tracing::info!(
            path = %path.display(),
            page_size = meta.page_size,
            records = meta.records,
            levels = meta.levels,
            "created store"
        );
        Ok(store)
    }

    fn load(path: &Path, writable: bool) -> Result<Self, StoreError> {
        let mut session = Session::open(path, writable)?;
        let meta_id = session
            .allocator()
            .directory()
            .get(TREE_ENTRY)
            .ok_or_else(|| StoreError::MissingDirectoryEntry(TREE_ENTRY.to_string()))?;
        let bytes = session.read_block(meta_id)?;
        let meta = TreeMeta::from_bytes(&bytes).map_err(StoreError::Descriptor)?;
        if !StoreConfig::is_valid_page_size(meta.page_size) {
            return Err(StoreError::InvalidPageSize(meta.page_size));
        }
        tracing::info!(
            path = %path.display(),
            writable,
            records = meta.records,
            levels = meta.levels,
            "opened store"
        );
        Ok(Self {
            session,
            meta,
            meta_id,
            path: path.to_path_buf(),
            writable,
            modified: false,
        })
    }

    fn tree(&mut self) -> BTree<'_> {
        BTree::new(&mut self.session, &mut self.meta)
    }

    const fn check_writable(&self) -> Result<(), StoreError> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.meta.records as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.meta.records == 0
    }

    /// Internal levels above the leaves; 0 when the root is a leaf.
    #[must_use]
    pub const fn levels(&self) -> u32 {
        self.meta.levels
    }

    /// Tree height, always at least 1.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.meta.height()
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.meta.page_size
    }

    /// Whether there are buffered changes.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Insert a record or replace the value stored under its key.
    ///
    /// Returns the previous value when a record was replaced.
    pub fn insert(&mut self, record: Record) -> Result<Option<Value>, StoreError> {
        self.check_writable()?;
        // A failed split may still have written nodes into the cache.
        self.modified = true;
        Ok(self.tree().insert(record)?)
    }

    /// Look up one record.
    pub fn get(&mut self, filename: &str, code: FourCC) -> Result<Option<Record>, StoreError> {
        Ok(self.tree().get(filename, code)?)
    }

    /// Records for `filename` (case-insensitive), optionally only `code`.
    pub fn find(&mut self, filename: &str, code: Option<FourCC>) -> Records<'_> {
        Records::new(&mut self.session, self.meta, filename.to_string(), code, true)
    }

    /// All records in key order.
    pub fn iter(&mut self) -> Records<'_> {
        Records::new(&mut self.session, self.meta, String::new(), None, false)
    }

    /// Per-file view of the records.
    pub fn group(&mut self, filename: &str) -> RecordGroup<'_> {
        RecordGroup {
            store: self,
            filename: filename.to_string(),
        }
    }

    /// Check the tree structure. See `BTree::verify`.
    pub fn verify(&mut self) -> Result<TreeStats, StoreError> {
        Ok(self.tree().verify()?)
    }

    /// Write buffered changes and sync. A no-op for read-only or unchanged
    /// stores.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if !self.writable || !self.modified {
            return Ok(());
        }
        self.session.write_block(self.meta_id, &self.meta.to_bytes())?;
        self.session.commit()?;
        self.modified = false;
        tracing::debug!(
            path = %self.path.display(),
            records = self.meta.records,
            nodes = self.meta.nodes,
            "flushed store"
        );
        Ok(())
    }

    /// Flush and close.
    pub fn close(mut self) -> Result<(), StoreError> {
        let result = self.flush();
        // Drop must not retry a failed flush.
        self.modified = false;
        result
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.writable || !self.modified {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!(
                path = %self.path.display(),
                "discarding unflushed changes while panicking"
            );
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(path = %self.path.display(), "failed to flush store on drop: {e}");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("meta", &self.meta)
            .field("writable", &self.writable)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// The records of one filename.
pub struct RecordGroup<'a> {
    store: &'a mut Store,
    filename: String,
}

impl RecordGroup<'_> {
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The value stored under `code`.
    pub fn get(&mut self, code: FourCC) -> Result<Value, StoreError> {
        self.store
            .get(&self.filename, code)?
            .map(|record| record.value)
            .ok_or_else(|| StoreError::KeyNotFound {
                filename: self.filename.clone(),
                code,
            })
    }

    /// Insert or replace the value under `code`.
    pub fn set(&mut self, code: FourCC, value: impl Into<Value>) -> Result<Option<Value>, StoreError> {
        self.store
            .insert(Record::new(self.filename.as_str(), code, value.into()))
    }

    /// All records of this filename, ordered by code.
    pub fn records(&mut self) -> Result<Vec<Record>, StoreError> {
        self.store
            .find(&self.filename, None)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }
}

/// Errors returned by `Store`.
#[derive(Debug)]
pub enum StoreError {
    /// File, allocator or node error.
    Storage(StorageError),
    /// Tree error.
    Tree(BTreeError),
    /// No record for this filename and code.
    KeyNotFound { filename: String, code: FourCC },
    /// The store was opened read-only.
    ReadOnly,
    /// The allocator directory lacks a required entry.
    MissingDirectoryEntry(String),
    /// The page size is not usable.
    InvalidPageSize(u32),
    /// The tree descriptor block is malformed.
    Descriptor(CursorError),
    /// Configuration could not be loaded.
    Config(ConfigError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Tree(e) => write!(f, "tree error: {e}"),
            Self::KeyNotFound { filename, code } => {
                write!(f, "no '{code}' record for '{filename}'")
            }
            Self::ReadOnly => write!(f, "store is read-only"),
            Self::MissingDirectoryEntry(name) => {
                write!(f, "directory has no '{name}' entry")
            }
            Self::InvalidPageSize(size) => write!(f, "invalid page size: {size}"),
            Self::Descriptor(e) => write!(f, "malformed tree descriptor: {e}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Tree(e) => Some(e),
            Self::Descriptor(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::KeyNotFound { .. }
            | Self::ReadOnly
            | Self::MissingDirectoryEntry(_)
            | Self::InvalidPageSize(_) => None,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BTreeError> for StoreError {
    fn from(e: BTreeError) -> Self {
        Self::Tree(e)
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AllocError> for StoreError {
    fn from(e: AllocError) -> Self {
        Self::Storage(StorageError::Alloc(e))
    }
}
