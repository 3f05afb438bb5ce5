// Layout of a .DS_Store file:
// 1. Buddy allocator: a header points at the bookkeeping block, which holds
//    the block address table, the named directory and the free lists
// 2. The "DSDB" directory entry names the tree descriptor block
// 3. The descriptor names the root of a B-tree of records, one per
//    (filename, code) pair
//
// Life of a write:
//  - Nodes load lazily into the session cache and are mutated in memory
//  - Flush writes dirty nodes, then the bookkeeping block, then the header
//
// Module map:
//  - types: four-character codes, values, records, byte cursor
//  - storage: allocator, file I/O, session, B-tree
//  - store: the public handle

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod storage;
mod store;
pub mod types;

#[cfg(test)]
mod e2e_tests;

pub use config::{ConfigError, StoreConfig};
pub use store::{OpenMode, RecordGroup, Store, StoreError};
pub use types::{FourCC, IconLocation, MacTime, Record, Value};
