use std::cmp::Ordering;

use crate::{
    index::index_types::{IndexKey, KeyCmpFn, KeyValuePair},
    storage::page::page::{PageId, INVALID_PAGE_ID},
};

/// The two node shapes a tree page can take.
///
/// An internal node with n children stores n - 1 separator keys; the
/// sentinel key slot of the classic layout is not materialized. Child i
/// covers keys in [keys[i - 1], keys[i]), with the first bound absent for
/// i = 0 and the last for i = n - 1.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeType {
    Internal {
        children: Vec<PageId>,
        keys: Vec<IndexKey>,
    },
    Leaf {
        entries: Vec<KeyValuePair>,
        /// Forward sibling link, `INVALID_PAGE_ID` at the rightmost leaf.
        next: PageId,
    },
}

/// A tree node decoded off its page. Mutations happen on this view and are
/// encoded back onto the pinned page before unpinning.
#[derive(Clone, Debug)]
pub struct Node {
    pub node_type: NodeType,
    pub page_id: PageId,
    pub parent: PageId,
    pub max_size: usize,
}

impl Node {
    pub fn new_leaf(page_id: PageId, parent: PageId, max_size: usize) -> Self {
        Node {
            node_type: NodeType::Leaf {
                entries: Vec::new(),
                next: INVALID_PAGE_ID,
            },
            page_id,
            parent,
            max_size,
        }
    }

    pub fn new_internal(page_id: PageId, parent: PageId, max_size: usize) -> Self {
        Node {
            node_type: NodeType::Internal {
                children: Vec::new(),
                keys: Vec::new(),
            },
            page_id,
            parent,
            max_size,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.node_type, NodeType::Leaf { .. })
    }

    /// Entry count: pairs for a leaf, children for an internal node.
    pub fn size(&self) -> usize {
        match &self.node_type {
            NodeType::Internal { children, .. } => children.len(),
            NodeType::Leaf { entries, .. } => entries.len(),
        }
    }

    /// Occupancy floor for non-root nodes.
    pub fn min_size(&self) -> usize {
        self.max_size.div_ceil(2)
    }

    /// Index of the child to descend through for `key`: the number of
    /// separator keys not greater than it.
    pub fn child_index_for(&self, key: &IndexKey, cmp: &KeyCmpFn) -> Option<usize> {
        match &self.node_type {
            NodeType::Internal { keys, .. } => {
                Some(keys.partition_point(|k| cmp(k, key) != Ordering::Greater))
            }
            NodeType::Leaf { .. } => None,
        }
    }

    /// Binary search for `key` among a leaf's entries. Ok holds the match,
    /// Err the insertion point.
    pub fn leaf_search(&self, key: &IndexKey, cmp: &KeyCmpFn) -> Result<usize, usize> {
        match &self.node_type {
            NodeType::Leaf { entries, .. } => entries.binary_search_by(|e| cmp(&e.key, key)),
            NodeType::Internal { .. } => Err(0),
        }
    }

    /// Moves the upper half of a leaf's entries out for a new sibling.
    /// Returns the key to promote and the moved entries.
    pub fn split_leaf_entries(&mut self) -> (IndexKey, Vec<KeyValuePair>) {
        let NodeType::Leaf { entries, .. } = &mut self.node_type else {
            unreachable!("leaf split on an internal node");
        };
        let upper = entries.split_off(entries.len() / 2);
        let promoted = upper[0].key.clone();
        (promoted, upper)
    }

    /// Moves the upper half of an internal node's children out for a new
    /// sibling. Returns the key to promote together with the moved
    /// children and their separator keys.
    pub fn split_internal_entries(&mut self) -> (IndexKey, Vec<PageId>, Vec<IndexKey>) {
        let NodeType::Internal { children, keys } = &mut self.node_type else {
            unreachable!("internal split on a leaf node");
        };
        let split_at = children.len() / 2;
        let upper_children = children.split_off(split_at);
        let mut upper_keys = keys.split_off(split_at - 1);
        // The separator between the halves travels up rather than into the
        // sibling, where its slot would sit before the first real key.
        let promoted = upper_keys.remove(0);
        (promoted, upper_children, upper_keys)
    }
}
