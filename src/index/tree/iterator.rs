use std::cmp::Ordering;

use log::warn;

use crate::{
    index::{
        errors::Error,
        index_types::{IndexKey, KeyValuePair},
        tree::{
            btree::BPlusTree,
            node::{Node, NodeType},
        },
    },
    storage::page::page::INVALID_PAGE_ID,
};

/// In-order scan over the leaf chain.
///
/// The iterator keeps its current leaf pinned and releases it when it hops
/// to the next leaf, reaches the end or is dropped.
pub struct TreeIterator<'a> {
    tree: &'a BPlusTree,
    leaf: Option<Node>,
    index: usize,
}

impl BPlusTree {
    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<TreeIterator<'_>, Error> {
        if self.is_empty() {
            return Ok(TreeIterator::exhausted(self));
        }

        let mut page_id = self.root_page_id();
        loop {
            let (node, _handle) = self.fetch_node(page_id)?;
            match &node.node_type {
                NodeType::Leaf { .. } => {
                    return Ok(TreeIterator {
                        tree: self,
                        leaf: Some(node),
                        index: 0,
                    })
                }
                NodeType::Internal { children, .. } => {
                    let child = children[0];
                    self.bpm.unpin_page(page_id, false);
                    page_id = child;
                }
            }
        }
    }

    /// Iterator positioned at `key`, or at the first key after it.
    pub fn begin_at(&self, key: &IndexKey) -> Result<TreeIterator<'_>, Error> {
        if self.is_empty() {
            return Ok(TreeIterator::exhausted(self));
        }

        let (leaf, _handle) = self.find_leaf(key)?;
        let cmp = self.comparator.as_ref();
        let index = match &leaf.node_type {
            NodeType::Leaf { entries, .. } => {
                entries.partition_point(|e| cmp(&e.key, key) == Ordering::Less)
            }
            NodeType::Internal { .. } => 0,
        };
        Ok(TreeIterator {
            tree: self,
            leaf: Some(leaf),
            index,
        })
    }

    /// Iterator positioned one past the largest key. Yields nothing; it
    /// marks the point every forward scan runs out at.
    pub fn end(&self) -> Result<TreeIterator<'_>, Error> {
        if self.is_empty() {
            return Ok(TreeIterator::exhausted(self));
        }

        let mut page_id = self.root_page_id();
        loop {
            let (node, _handle) = self.fetch_node(page_id)?;
            match &node.node_type {
                NodeType::Leaf { .. } => {
                    let index = node.size();
                    return Ok(TreeIterator {
                        tree: self,
                        leaf: Some(node),
                        index,
                    });
                }
                NodeType::Internal { children, .. } => {
                    let child = *children.last().expect("internal node with no children");
                    self.bpm.unpin_page(page_id, false);
                    page_id = child;
                }
            }
        }
    }
}

impl<'a> TreeIterator<'a> {
    fn exhausted(tree: &'a BPlusTree) -> Self {
        TreeIterator {
            tree,
            leaf: None,
            index: 0,
        }
    }

    fn release(&mut self) {
        if let Some(leaf) = self.leaf.take() {
            self.tree.bpm.unpin_page(leaf.page_id, false);
        }
    }
}

impl Iterator for TreeIterator<'_> {
    type Item = KeyValuePair;

    fn next(&mut self) -> Option<KeyValuePair> {
        loop {
            let leaf = self.leaf.as_ref()?;
            let NodeType::Leaf { entries, next } = &leaf.node_type else {
                self.release();
                return None;
            };

            if self.index < entries.len() {
                let entry = entries[self.index].clone();
                self.index += 1;
                return Some(entry);
            }

            // This leaf is spent; hop along the sibling chain.
            let next = *next;
            self.release();
            if next == INVALID_PAGE_ID {
                return None;
            }
            match self.tree.fetch_node(next) {
                Ok((node, _handle)) => {
                    self.leaf = Some(node);
                    self.index = 0;
                }
                Err(err) => {
                    warn!("stopping scan: failed to read leaf {}: {}", next, err);
                    return None;
                }
            }
        }
    }
}

impl Drop for TreeIterator<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
