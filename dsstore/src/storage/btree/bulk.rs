//! Bottom-up construction of a tree from sorted records.
//!
//! Leaves are packed greedily: a record that does not fit in the current
//! leaf becomes the separator between it and the next one. Internal levels
//! are packed the same way from the `(child, separator, child, ...)`
//! sequence of the level below. When the last node of a level would be left
//! empty, the last record of its left neighbour is rotated through the
//! separator so it ends up with exactly one record.

use crate::storage::block::BlockId;
use crate::storage::btree::node::{NODE_HEADER_LEN, Node};
use crate::storage::btree::tree::{BTreeError, TreeMeta, max_record_len};
use crate::storage::session::Session;
use crate::types::Record;

/// Build a tree holding `records`, which must be strictly ascending by key.
///
/// Returns the descriptor of the new tree. Nodes are placed in the session's
/// cache as dirty; nothing is written until the session commits.
#[allow(clippy::cast_possible_truncation)]
pub fn bulk_load(
    session: &mut Session,
    page_size: u32,
    records: Vec<Record>,
) -> Result<TreeMeta, BTreeError> {
    let max = max_record_len(page_size);
    for (index, record) in records.iter().enumerate() {
        let len = record.encoded_len();
        if len > max {
            return Err(BTreeError::RecordTooLarge { len, max });
        }
        if index > 0 && !records[index - 1].cmp_record(record).is_lt() {
            return Err(BTreeError::UnsortedBulkLoad { index });
        }
    }

    let total = records.len() as u32;
    let page = page_size as usize;

    let (leaves, mut separators) = pack_leaves(records, page);
    let mut nodes = leaves.len() as u32;
    let mut children = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        let id = session.allocate(u64::from(page_size))?;
        session.put_node(id, Node::leaf(leaf));
        children.push(id);
    }

    let mut levels = 0;
    while children.len() > 1 {
        let (groups, upper) = pack_internal(children, separators, page);
        children = Vec::with_capacity(groups.len());
        for group in groups {
            let id = session.allocate(u64::from(page_size))?;
            session.put_node(id, group);
            children.push(id);
        }
        nodes += children.len() as u32;
        separators = upper;
        levels += 1;
    }

    let Some(root) = children.pop() else {
        return Err(BTreeError::Corruption(
            "bulk load produced no root".to_string(),
        ));
    };
    tracing::debug!(records = total, nodes, levels, "bulk loaded tree");
    Ok(TreeMeta {
        root,
        levels,
        records: total,
        nodes,
        page_size,
    })
}

/// Split sorted records into leaves and the separators between them.
///
/// # Post-conditions
///
/// `leaves.len() == separators.len() + 1` and no leaf is empty unless the
/// input was.
fn pack_leaves(records: Vec<Record>, page: usize) -> (Vec<Vec<Record>>, Vec<Record>) {
    let mut leaves: Vec<Vec<Record>> = vec![Vec::new()];
    let mut separators = Vec::new();
    let mut size = NODE_HEADER_LEN;

    for record in records {
        let len = record.encoded_len();
        let current = leaves.last().map_or(0, Vec::len);
        if current > 0 && size + len > page {
            separators.push(record);
            leaves.push(Vec::new());
            size = NODE_HEADER_LEN;
            continue;
        }
        size += len;
        if let Some(leaf) = leaves.last_mut() {
            leaf.push(record);
        }
    }

    // The last record went up as a separator: rotate one record from the
    // previous leaf so the final leaf holds the old separator.
    if leaves.len() > 1 && leaves.last().is_some_and(Vec::is_empty) {
        let last = leaves.len() - 1;
        if let (Some(moved), Some(old_separator)) = (leaves[last - 1].pop(), separators.pop()) {
            separators.push(moved);
            leaves[last].push(old_separator);
        }
    }
    (leaves, separators)
}

/// Group one level's children and separators into internal nodes.
///
/// Returns the nodes of the new level and the separators between them.
fn pack_internal(
    children: Vec<BlockId>,
    separators: Vec<Record>,
    page: usize,
) -> (Vec<Node>, Vec<Record>) {
    let mut children = children.into_iter();
    let mut groups: Vec<Node> = Vec::new();
    let mut upper = Vec::new();

    let mut current = Node::internal(Vec::new(), children.next().into_iter().collect());
    let mut size = NODE_HEADER_LEN;
    for (separator, child) in separators.into_iter().zip(children) {
        let len = 4 + separator.encoded_len();
        if !current.records.is_empty() && size + len > page {
            groups.push(std::mem::replace(&mut current, Node::internal(Vec::new(), vec![child])));
            upper.push(separator);
            size = NODE_HEADER_LEN;
            continue;
        }
        size += len;
        current.records.push(separator);
        current.children.push(child);
    }

    if current.records.is_empty()
        && let Some(previous) = groups.last_mut()
        && let (Some(promoted), Some(first_child), Some(old_separator)) = (
            previous.records.pop(),
            previous.children.pop(),
            upper.pop(),
        )
    {
        // Last group holds a lone child: borrow the previous group's last
        // record and child.
        current.records.insert(0, old_separator);
        current.children.insert(0, first_child);
        upper.push(promoted);
    }
    groups.push(current);
    (groups, upper)
}
