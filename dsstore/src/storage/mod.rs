//! On-disk storage: block allocator, file I/O and the B-tree.
//!
//! # File structure
//!
//! ```text
//! +------------------+ file offset 0
//! | 00 00 00 01      | prefix; all addresses below are relative to byte 4
//! +------------------+ address 0
//! | header (32 B)    | "Bud1", bookkeeping block location
//! +------------------+
//! | blocks ...       | power-of-two blocks handed out by the allocator:
//! |                  | bookkeeping block, tree descriptor, tree nodes
//! +------------------+
//! ```
//!
//! Everything is big-endian.

pub mod allocator;
pub mod block;
pub mod btree;
pub mod directory;
pub mod file;
pub mod header;
pub mod session;

pub use allocator::{AllocError, BuddyAllocator};
pub use block::{BlockAddress, BlockId};
pub use file::{BlockStore, FileError};
pub use header::{Header, HeaderError};
pub use session::{Session, StorageError};
