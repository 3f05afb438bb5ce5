//! Ordered traversal with an explicit stack.
//!
//! Each stack entry is `(block, next record index)`. For an internal node,
//! every child left of the next record has already been visited, so yielding
//! record `i` continues with the leftmost path of child `i + 1`.

use crate::storage::block::BlockId;
use crate::storage::btree::tree::{BTreeError, TreeMeta, child_at};
use crate::storage::session::Session;
use crate::types::{FourCC, Record};

/// Lazy iterator over records in key order.
///
/// The first call to `next` seeks to the lower bound; nothing is read before
/// that. Once an error is yielded the iterator is exhausted.
pub struct Records<'a> {
    session: &'a mut Session,
    meta: TreeMeta,
    stack: Vec<(BlockId, usize)>,
    filename: String,
    code: Option<FourCC>,
    /// Stop at the first record whose filename (and code) stop matching.
    filtered: bool,
    started: bool,
    done: bool,
}

impl<'a> Records<'a> {
    pub(crate) const fn new(
        session: &'a mut Session,
        meta: TreeMeta,
        filename: String,
        code: Option<FourCC>,
        filtered: bool,
    ) -> Self {
        Self {
            session,
            meta,
            stack: Vec::new(),
            filename,
            code,
            filtered,
            started: false,
            done: false,
        }
    }

    fn push(&mut self, id: BlockId, index: usize) -> Result<(), BTreeError> {
        self.stack.push((id, index));
        if self.stack.len() > self.meta.height() as usize {
            return Err(BTreeError::Corruption(format!(
                "traversal deeper than {} levels at node {id}",
                self.meta.height()
            )));
        }
        Ok(())
    }

    /// Descend from the root to the first record not below the search key.
    fn seek(&mut self) -> Result<(), BTreeError> {
        let code = self.code.unwrap_or(FourCC::MIN);
        let mut id = self.meta.root;
        loop {
            let node = self.session.node(id)?;
            let (index, exact) = match node.search(&self.filename, code) {
                Ok(index) => (index, true),
                Err(index) => (index, false),
            };
            let next = if exact || node.is_leaf() {
                None
            } else {
                Some(child_at(node, id, index)?)
            };
            self.push(id, index)?;
            match next {
                Some(child) => id = child,
                None => return Ok(()),
            }
        }
    }

    /// Push the leftmost path starting at `id`.
    fn descend_leftmost(&mut self, mut id: BlockId) -> Result<(), BTreeError> {
        loop {
            let node = self.session.node(id)?;
            let next = if node.is_leaf() {
                None
            } else {
                Some(child_at(node, id, 0)?)
            };
            self.push(id, 0)?;
            match next {
                Some(child) => id = child,
                None => return Ok(()),
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Record>, BTreeError> {
        if !self.started {
            self.started = true;
            self.seek()?;
        }
        while let Some(&(id, index)) = self.stack.last() {
            let node = self.session.node(id)?;
            let Some(record) = node.records.get(index).cloned() else {
                self.stack.pop();
                continue;
            };
            let next = if node.is_leaf() {
                None
            } else {
                Some(child_at(node, id, index + 1)?)
            };
            if let Some(top) = self.stack.last_mut() {
                top.1 += 1;
            }
            if let Some(child) = next {
                self.descend_leftmost(child)?;
            }
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn matches(&self, record: &Record) -> bool {
        !self.filtered
            || (record.matches_filename(&self.filename)
                && self.code.is_none_or(|code| record.code == code))
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record, BTreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(record)) if self.matches(&record) => Some(Ok(record)),
            Ok(_) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
