//! Paginated B-tree of records.
//!
//! # Structure
//!
//! Records live in both leaf and internal nodes: an internal record
//! separates the subtree to its left from the one to its right, so every
//! record is stored exactly once. All leaves sit at depth `levels`.
//!
//! Nodes are limited to `page_size` bytes. Inserting into a full node
//! splits it around a byte-balanced middle record, which moves up into the
//! parent; splitting the root adds a level.
//!
//! # Usage
//!
//! ```
//! use dsstore::storage::btree::max_record_len;
//!
//! // Two records of the largest size still fit in one node.
//! let max = max_record_len(4096);
//! assert!(8 + 2 * (4 + max) <= 4096);
//! ```

mod bulk;
mod cursor;
mod node;
mod tree;

pub use bulk::bulk_load;
pub use cursor::Records;
pub use node::{NODE_HEADER_LEN, Node, NodeError};
pub use tree::{BTree, BTreeError, DESCRIPTOR_LEN, TreeMeta, TreeStats, max_record_len};
