use std::{
    cmp::Ordering,
    sync::{Arc, Mutex},
};

use log::debug;

use crate::{
    buffer::buffer_pool_manager::{BufferPoolManager, PageHandle},
    index::{
        errors::Error,
        index_types::{IndexKey, KeyComparator, KeyValuePair, RowId},
        tree::{
            codec::Codec,
            node::{Node, NodeType},
        },
    },
    storage::page::{
        header_page,
        page::{PageId, HEADER_PAGE_ID, INVALID_PAGE_ID},
    },
};

/// B+ tree index whose nodes live only as buffered pages.
///
/// Every operation works on decoded copies of the pages it touches, pins
/// the page for exactly as long as the copy is live, and encodes the copy
/// back before the final unpin when it mutated anything. The root page id
/// is mirrored in the header page under the index name, so a tree can be
/// reopened against the same buffer pool.
pub struct BPlusTree {
    index_name: String,
    pub(crate) bpm: Arc<BufferPoolManager>,
    pub(crate) comparator: KeyComparator,
    leaf_max_size: usize,
    internal_max_size: usize,
    root_page_id: Mutex<PageId>,
}

impl BPlusTree {
    /// Opens (or registers) the named index. The root recorded in the
    /// header page is picked up if the index already exists.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: KeyComparator,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, Error> {
        assert!(leaf_max_size >= 2, "leaf nodes need room for two entries");
        assert!(internal_max_size >= 3, "internal nodes need room for three children");

        let index_name = index_name.into();
        let handle = bpm.fetch_page(HEADER_PAGE_ID).ok_or(Error::PoolExhausted)?;
        let (root, registered) = {
            let mut page = handle.write();
            match header_page::find_record(page.data(), &index_name) {
                Some(root) => (root, false),
                None => {
                    header_page::insert_record(page.data_mut(), &index_name, INVALID_PAGE_ID);
                    (INVALID_PAGE_ID, true)
                }
            }
        };
        bpm.unpin_page(HEADER_PAGE_ID, registered);

        Ok(BPlusTree {
            index_name,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_page_id: Mutex::new(root),
        })
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id() == INVALID_PAGE_ID
    }

    /// Looks up the value stored under `key`.
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RowId>, Error> {
        if self.is_empty() {
            return Ok(None);
        }
        let (leaf, _handle) = self.find_leaf(key)?;
        let result = match leaf.leaf_search(key, self.comparator.as_ref()) {
            Ok(idx) => match &leaf.node_type {
                NodeType::Leaf { entries, .. } => Some(entries[idx].value),
                NodeType::Internal { .. } => None,
            },
            Err(_) => None,
        };
        self.bpm.unpin_page(leaf.page_id, false);
        Ok(result)
    }

    /// Inserts the pair, overwriting the value if the key is present.
    pub fn insert(&self, key: IndexKey, value: RowId) -> Result<bool, Error> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }

        let (mut leaf, handle) = self.find_leaf(&key)?;
        match leaf.leaf_search(&key, self.comparator.as_ref()) {
            Ok(idx) => {
                if let NodeType::Leaf { entries, .. } = &mut leaf.node_type {
                    entries[idx].value = value;
                }
                self.write_node(&handle, &leaf)?;
                self.bpm.unpin_page(leaf.page_id, true);
                return Ok(true);
            }
            Err(idx) => {
                if let NodeType::Leaf { entries, .. } = &mut leaf.node_type {
                    entries.insert(idx, KeyValuePair::new(key, value));
                }
            }
        }

        if leaf.size() <= self.leaf_max_size {
            self.write_node(&handle, &leaf)?;
            self.bpm.unpin_page(leaf.page_id, true);
            return Ok(true);
        }

        self.split_leaf(leaf, handle)?;
        Ok(true)
    }

    /// Removes the key if present. Missing keys are ignored.
    pub fn remove(&self, key: &IndexKey) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }

        let (mut leaf, handle) = self.find_leaf(key)?;
        let idx = match leaf.leaf_search(key, self.comparator.as_ref()) {
            Ok(idx) => idx,
            Err(_) => {
                self.bpm.unpin_page(leaf.page_id, false);
                return Ok(());
            }
        };
        if let NodeType::Leaf { entries, .. } = &mut leaf.node_type {
            entries.remove(idx);
        }

        if leaf.page_id == self.root_page_id() {
            if leaf.size() == 0 {
                // The last entry is gone; the tree reverts to empty.
                let page_id = leaf.page_id;
                self.bpm.unpin_page(page_id, true);
                self.bpm.delete_page(page_id);
                self.set_root(INVALID_PAGE_ID)?;
            } else {
                self.write_node(&handle, &leaf)?;
                self.bpm.unpin_page(leaf.page_id, true);
            }
            return Ok(());
        }

        // Walk upward while nodes dip below their occupancy floor.
        let mut current = Some((leaf, handle));
        while let Some((node, node_handle)) = current {
            if node.page_id == self.root_page_id() || node.size() >= node.min_size() {
                self.write_node(&node_handle, &node)?;
                self.bpm.unpin_page(node.page_id, true);
                break;
            }
            current = self.solve_underflow(node, node_handle)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // descent
    // ------------------------------------------------------------------

    /// Descends from the root to the leaf responsible for `key`, pinning
    /// one page at a time. The returned leaf stays pinned.
    pub(crate) fn find_leaf(&self, key: &IndexKey) -> Result<(Node, PageHandle), Error> {
        let mut page_id = self.root_page_id();
        loop {
            let (node, handle) = self.fetch_node(page_id)?;
            match &node.node_type {
                NodeType::Leaf { .. } => return Ok((node, handle)),
                NodeType::Internal { children, .. } => {
                    let idx = node
                        .child_index_for(key, self.comparator.as_ref())
                        .expect("internal node");
                    let child = children[idx];
                    self.bpm.unpin_page(page_id, false);
                    page_id = child;
                }
            }
        }
    }

    pub(crate) fn fetch_node(&self, page_id: PageId) -> Result<(Node, PageHandle), Error> {
        let handle = self.bpm.fetch_page(page_id).ok_or(Error::PoolExhausted)?;
        let node = {
            let page = handle.read();
            Codec::decode(page_id, page.data())?
        };
        Ok((node, handle))
    }

    pub(crate) fn write_node(&self, handle: &PageHandle, node: &Node) -> Result<(), Error> {
        let mut page = handle.write();
        Codec::encode(node, page.data_mut())?;
        Ok(())
    }

    /// Re-points a node's parent id and persists it.
    fn update_parent(&self, page_id: PageId, parent: PageId) -> Result<(), Error> {
        let (mut node, handle) = self.fetch_node(page_id)?;
        node.parent = parent;
        self.write_node(&handle, &node)?;
        self.bpm.unpin_page(page_id, true);
        Ok(())
    }

    /// Records the new root in memory and in the header page.
    fn set_root(&self, new_root: PageId) -> Result<(), Error> {
        *self.root_page_id.lock().unwrap() = new_root;

        let handle = self.bpm.fetch_page(HEADER_PAGE_ID).ok_or(Error::PoolExhausted)?;
        {
            let mut page = handle.write();
            if !header_page::update_record(page.data_mut(), &self.index_name, new_root) {
                header_page::insert_record(page.data_mut(), &self.index_name, new_root);
            }
        }
        self.bpm.unpin_page(HEADER_PAGE_ID, true);
        Ok(())
    }

    // ------------------------------------------------------------------
    // insertion
    // ------------------------------------------------------------------

    fn start_new_tree(&self, key: IndexKey, value: RowId) -> Result<(), Error> {
        let handle = self.bpm.new_page().ok_or(Error::PoolExhausted)?;
        let page_id = handle.page_id();

        let mut root = Node::new_leaf(page_id, INVALID_PAGE_ID, self.leaf_max_size);
        if let NodeType::Leaf { entries, .. } = &mut root.node_type {
            entries.push(KeyValuePair::new(key, value));
        }
        self.write_node(&handle, &root)?;
        self.bpm.unpin_page(page_id, true);
        self.set_root(page_id)?;
        debug!("started tree {} at root {}", self.index_name, page_id);
        Ok(())
    }

    /// Splits an overflowing leaf, linking the sibling chain and promoting
    /// the sibling's first key.
    fn split_leaf(&self, mut leaf: Node, leaf_handle: PageHandle) -> Result<(), Error> {
        let sibling_handle = self.bpm.new_page().ok_or(Error::PoolExhausted)?;
        let sibling_id = sibling_handle.page_id();

        let (promoted, upper) = leaf.split_leaf_entries();
        let old_next = match &mut leaf.node_type {
            NodeType::Leaf { next, .. } => std::mem::replace(next, sibling_id),
            NodeType::Internal { .. } => unreachable!("leaf split on an internal node"),
        };
        let mut sibling = Node {
            node_type: NodeType::Leaf {
                entries: upper,
                next: old_next,
            },
            page_id: sibling_id,
            parent: leaf.parent,
            max_size: self.leaf_max_size,
        };
        debug!("split leaf {} into {}", leaf.page_id, sibling_id);

        if leaf.page_id == self.root_page_id() {
            let root_handle = self.bpm.new_page().ok_or(Error::PoolExhausted)?;
            let root_id = root_handle.page_id();
            let new_root = Node {
                node_type: NodeType::Internal {
                    children: vec![leaf.page_id, sibling_id],
                    keys: vec![promoted],
                },
                page_id: root_id,
                parent: INVALID_PAGE_ID,
                max_size: self.internal_max_size,
            };
            leaf.parent = root_id;
            sibling.parent = root_id;

            self.write_node(&root_handle, &new_root)?;
            self.bpm.unpin_page(root_id, true);
            self.write_node(&leaf_handle, &leaf)?;
            self.bpm.unpin_page(leaf.page_id, true);
            self.write_node(&sibling_handle, &sibling)?;
            self.bpm.unpin_page(sibling_id, true);
            self.set_root(root_id)?;
            return Ok(());
        }

        let parent_id = leaf.parent;
        self.write_node(&leaf_handle, &leaf)?;
        self.bpm.unpin_page(leaf.page_id, true);
        self.write_node(&sibling_handle, &sibling)?;
        self.bpm.unpin_page(sibling_id, true);
        self.insert_into_parent(parent_id, promoted, sibling_id)
    }

    /// Adds (key, right child) to an internal node, splitting upward while
    /// nodes overflow.
    fn insert_into_parent(
        &self,
        parent_id: PageId,
        key: IndexKey,
        right_child: PageId,
    ) -> Result<(), Error> {
        let (mut parent, parent_handle) = self.fetch_node(parent_id)?;

        {
            let cmp = self.comparator.as_ref();
            let NodeType::Internal { children, keys } = &mut parent.node_type else {
                return Err(Error::CorruptPage(format!(
                    "page {} used as a parent but holds a leaf",
                    parent_id
                )));
            };
            let pos = keys.partition_point(|k| cmp(k, &key) == Ordering::Less);
            keys.insert(pos, key);
            children.insert(pos + 1, right_child);
        }

        if parent.size() <= self.internal_max_size {
            self.write_node(&parent_handle, &parent)?;
            self.bpm.unpin_page(parent_id, true);
            return Ok(());
        }

        // Split the overflowing internal node.
        let sibling_handle = self.bpm.new_page().ok_or(Error::PoolExhausted)?;
        let sibling_id = sibling_handle.page_id();

        let (promoted, upper_children, upper_keys) = parent.split_internal_entries();
        let mut sibling = Node {
            node_type: NodeType::Internal {
                children: upper_children,
                keys: upper_keys,
            },
            page_id: sibling_id,
            parent: parent.parent,
            max_size: self.internal_max_size,
        };
        debug!("split internal {} into {}", parent_id, sibling_id);

        // The children that moved across still point at the old parent.
        if let NodeType::Internal { children, .. } = &sibling.node_type {
            for &child in children {
                self.update_parent(child, sibling_id)?;
            }
        }

        if parent.page_id == self.root_page_id() {
            let root_handle = self.bpm.new_page().ok_or(Error::PoolExhausted)?;
            let root_id = root_handle.page_id();
            let new_root = Node {
                node_type: NodeType::Internal {
                    children: vec![parent_id, sibling_id],
                    keys: vec![promoted],
                },
                page_id: root_id,
                parent: INVALID_PAGE_ID,
                max_size: self.internal_max_size,
            };
            parent.parent = root_id;
            sibling.parent = root_id;

            self.write_node(&root_handle, &new_root)?;
            self.bpm.unpin_page(root_id, true);
            self.write_node(&parent_handle, &parent)?;
            self.bpm.unpin_page(parent_id, true);
            self.write_node(&sibling_handle, &sibling)?;
            self.bpm.unpin_page(sibling_id, true);
            self.set_root(root_id)?;
            return Ok(());
        }

        let grandparent_id = parent.parent;
        self.write_node(&parent_handle, &parent)?;
        self.bpm.unpin_page(parent_id, true);
        self.write_node(&sibling_handle, &sibling)?;
        self.bpm.unpin_page(sibling_id, true);
        self.insert_into_parent(grandparent_id, promoted, sibling_id)
    }

    // ------------------------------------------------------------------
    // deletion
    // ------------------------------------------------------------------

    /// Rebalances one underflowing node against a sibling. Returns the
    /// parent, still pinned, when the fix shrank it below its own floor.
    fn solve_underflow(
        &self,
        mut node: Node,
        node_handle: PageHandle,
    ) -> Result<Option<(Node, PageHandle)>, Error> {
        let parent_id = node.parent;
        let (mut parent, parent_handle) = self.fetch_node(parent_id)?;

        let node_pos = {
            let NodeType::Internal { children, .. } = &parent.node_type else {
                return Err(Error::CorruptPage(format!(
                    "page {} used as a parent but holds a leaf",
                    parent_id
                )));
            };
            children
                .iter()
                .position(|&c| c == node.page_id)
                .ok_or_else(|| {
                    Error::CorruptPage(format!(
                        "page {} missing from its parent {}",
                        node.page_id, parent_id
                    ))
                })?
        };

        if node_pos > 0 {
            // Left sibling exists: borrow from it, or drain into it.
            let sibling_id = match &parent.node_type {
                NodeType::Internal { children, .. } => children[node_pos - 1],
                NodeType::Leaf { .. } => unreachable!(),
            };
            let (mut sibling, sibling_handle) = self.fetch_node(sibling_id)?;

            if sibling.size() > sibling.min_size() {
                self.borrow_from_left(&mut parent, &mut node, &mut sibling, node_pos)?;
                self.write_node(&sibling_handle, &sibling)?;
                self.bpm.unpin_page(sibling_id, true);
                self.write_node(&node_handle, &node)?;
                self.bpm.unpin_page(node.page_id, true);
                self.write_node(&parent_handle, &parent)?;
                self.bpm.unpin_page(parent_id, true);
                return Ok(None);
            }

            let node_id = node.page_id;
            self.merge_nodes(&mut parent, &mut sibling, node, node_pos)?;
            self.write_node(&sibling_handle, &sibling)?;
            self.bpm.unpin_page(sibling_id, true);
            self.bpm.unpin_page(node_id, false);
            self.bpm.delete_page(node_id);
            debug!("merged page {} into {}", node_id, sibling_id);
        } else {
            // Leftmost child: work against the right sibling instead.
            let sibling_id = match &parent.node_type {
                NodeType::Internal { children, .. } => {
                    *children.get(1).ok_or_else(|| {
                        Error::CorruptPage(format!("parent {} has a single child", parent_id))
                    })?
                }
                NodeType::Leaf { .. } => unreachable!(),
            };
            let (mut sibling, sibling_handle) = self.fetch_node(sibling_id)?;

            if sibling.size() > sibling.min_size() {
                self.borrow_from_right(&mut parent, &mut node, &mut sibling, node_pos)?;
                self.write_node(&sibling_handle, &sibling)?;
                self.bpm.unpin_page(sibling_id, true);
                self.write_node(&node_handle, &node)?;
                self.bpm.unpin_page(node.page_id, true);
                self.write_node(&parent_handle, &parent)?;
                self.bpm.unpin_page(parent_id, true);
                return Ok(None);
            }

            let node_id = node.page_id;
            self.merge_nodes(&mut parent, &mut node, sibling, 1)?;
            self.write_node(&node_handle, &node)?;
            self.bpm.unpin_page(node_id, true);
            self.bpm.unpin_page(sibling_id, false);
            self.bpm.delete_page(sibling_id);
            debug!("merged page {} into {}", sibling_id, node_id);
        }

        self.finish_parent(parent, parent_handle)
    }

    /// Moves one entry from the left sibling across the separator.
    fn borrow_from_left(
        &self,
        parent: &mut Node,
        node: &mut Node,
        sibling: &mut Node,
        node_pos: usize,
    ) -> Result<(), Error> {
        let node_id = node.page_id;
        let NodeType::Internal { keys: p_keys, .. } = &mut parent.node_type else {
            return Err(Error::CorruptPage("leaf parent in rebalance".into()));
        };

        match (&mut sibling.node_type, &mut node.node_type) {
            (
                NodeType::Leaf { entries: s_entries, .. },
                NodeType::Leaf { entries: n_entries, .. },
            ) => {
                let moved = s_entries
                    .pop()
                    .ok_or_else(|| Error::CorruptPage("borrow from an empty leaf".into()))?;
                p_keys[node_pos - 1] = moved.key.clone();
                n_entries.insert(0, moved);
            }
            (
                NodeType::Internal { children: s_children, keys: s_keys },
                NodeType::Internal { children: n_children, keys: n_keys },
            ) => {
                let moved_child = s_children
                    .pop()
                    .ok_or_else(|| Error::CorruptPage("borrow from an empty node".into()))?;
                let moved_key = s_keys
                    .pop()
                    .ok_or_else(|| Error::CorruptPage("borrow from a keyless node".into()))?;
                // The separator rotates down into the node; the sibling's
                // last key rotates up to replace it.
                let old_separator = std::mem::replace(&mut p_keys[node_pos - 1], moved_key);
                n_keys.insert(0, old_separator);
                n_children.insert(0, moved_child);
                self.update_parent(moved_child, node_id)?;
            }
            _ => return Err(Error::CorruptPage("siblings of different kinds".into())),
        }
        Ok(())
    }

    /// Moves one entry from the right sibling across the separator.
    fn borrow_from_right(
        &self,
        parent: &mut Node,
        node: &mut Node,
        sibling: &mut Node,
        node_pos: usize,
    ) -> Result<(), Error> {
        let node_id = node.page_id;
        let NodeType::Internal { keys: p_keys, .. } = &mut parent.node_type else {
            return Err(Error::CorruptPage("leaf parent in rebalance".into()));
        };

        match (&mut node.node_type, &mut sibling.node_type) {
            (
                NodeType::Leaf { entries: n_entries, .. },
                NodeType::Leaf { entries: s_entries, .. },
            ) => {
                if s_entries.is_empty() {
                    return Err(Error::CorruptPage("borrow from an empty leaf".into()));
                }
                let moved = s_entries.remove(0);
                n_entries.push(moved);
                p_keys[node_pos] = s_entries[0].key.clone();
            }
            (
                NodeType::Internal { children: n_children, keys: n_keys },
                NodeType::Internal { children: s_children, keys: s_keys },
            ) => {
                if s_children.is_empty() || s_keys.is_empty() {
                    return Err(Error::CorruptPage("borrow from an empty node".into()));
                }
                let moved_child = s_children.remove(0);
                let moved_key = s_keys.remove(0);
                let old_separator = std::mem::replace(&mut p_keys[node_pos], moved_key);
                n_keys.push(old_separator);
                n_children.push(moved_child);
                self.update_parent(moved_child, node_id)?;
            }
            _ => return Err(Error::CorruptPage("siblings of different kinds".into())),
        }
        Ok(())
    }

    /// Drains `right` into `left` and drops the separator from the parent.
    /// `right_pos` is the right participant's child index in the parent.
    fn merge_nodes(
        &self,
        parent: &mut Node,
        left: &mut Node,
        mut right: Node,
        right_pos: usize,
    ) -> Result<(), Error> {
        let left_id = left.page_id;
        let NodeType::Internal { children: p_children, keys: p_keys } = &mut parent.node_type
        else {
            return Err(Error::CorruptPage("leaf parent in merge".into()));
        };
        let separator = p_keys.remove(right_pos - 1);
        p_children.remove(right_pos);

        match (&mut left.node_type, &mut right.node_type) {
            (
                NodeType::Leaf { entries: l_entries, next: l_next },
                NodeType::Leaf { entries: r_entries, next: r_next },
            ) => {
                l_entries.append(r_entries);
                *l_next = *r_next;
            }
            (
                NodeType::Internal { children: l_children, keys: l_keys },
                NodeType::Internal { children: r_children, keys: r_keys },
            ) => {
                // The separator comes down to sit between the two key runs.
                l_keys.push(separator);
                l_keys.append(r_keys);
                let moved: Vec<PageId> = r_children.drain(..).collect();
                for &child in &moved {
                    self.update_parent(child, left_id)?;
                }
                l_children.extend(moved);
            }
            _ => return Err(Error::CorruptPage("merge of different kinds".into())),
        }
        Ok(())
    }

    /// Post-merge parent handling: demote a single-child root, keep
    /// walking on underflow, or settle.
    fn finish_parent(
        &self,
        parent: Node,
        parent_handle: PageHandle,
    ) -> Result<Option<(Node, PageHandle)>, Error> {
        if parent.page_id == self.root_page_id() {
            if parent.size() == 1 {
                let only_child = match &parent.node_type {
                    NodeType::Internal { children, .. } => children[0],
                    NodeType::Leaf { .. } => {
                        return Err(Error::CorruptPage("leaf root in demotion".into()))
                    }
                };
                let parent_id = parent.page_id;
                self.bpm.unpin_page(parent_id, true);
                self.bpm.delete_page(parent_id);
                self.update_parent(only_child, INVALID_PAGE_ID)?;
                self.set_root(only_child)?;
                debug!("root {} demoted to {}", parent_id, only_child);
            } else {
                self.write_node(&parent_handle, &parent)?;
                self.bpm.unpin_page(parent.page_id, true);
            }
            return Ok(None);
        }

        // Keep the page image coherent before deciding whether the walk
        // continues; the caller owns the pin either way.
        self.write_node(&parent_handle, &parent)?;
        if parent.size() < parent.min_size() {
            return Ok(Some((parent, parent_handle)));
        }
        self.bpm.unpin_page(parent.page_id, true);
        Ok(None)
    }

    // ------------------------------------------------------------------
    // integrity
    // ------------------------------------------------------------------

    /// Walks the whole tree checking occupancy bounds, key ordering,
    /// parent pointers and uniform depth. Intended for tests.
    pub fn verify(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        self.verify_node(self.root_page_id(), INVALID_PAGE_ID, None, None)?;
        Ok(())
    }

    fn verify_node(
        &self,
        page_id: PageId,
        expected_parent: PageId,
        lower: Option<&IndexKey>,
        upper: Option<&IndexKey>,
    ) -> Result<usize, Error> {
        let (node, _handle) = self.fetch_node(page_id)?;
        self.bpm.unpin_page(page_id, false);
        let cmp = self.comparator.as_ref();

        if node.parent != expected_parent {
            return Err(Error::CorruptPage(format!(
                "page {} parent is {} but {} was expected",
                page_id, node.parent, expected_parent
            )));
        }
        let is_root = page_id == self.root_page_id();
        if !is_root && node.size() < node.min_size() {
            return Err(Error::CorruptPage(format!(
                "page {} below minimum occupancy",
                page_id
            )));
        }
        if node.size() > node.max_size {
            return Err(Error::CorruptPage(format!(
                "page {} above maximum occupancy",
                page_id
            )));
        }

        let in_bounds = |key: &IndexKey| {
            lower.map_or(true, |low| cmp(low, key) != Ordering::Greater)
                && upper.map_or(true, |up| cmp(key, up) == Ordering::Less)
        };

        match &node.node_type {
            NodeType::Leaf { entries, .. } => {
                for window in entries.windows(2) {
                    if cmp(&window[0].key, &window[1].key) != Ordering::Less {
                        return Err(Error::CorruptPage(format!(
                            "page {} keys out of order",
                            page_id
                        )));
                    }
                }
                if let Some(entry) = entries.iter().find(|e| !in_bounds(&e.key)) {
                    return Err(Error::CorruptPage(format!(
                        "page {} holds key {:?} outside its bounds",
                        page_id, entry.key
                    )));
                }
                Ok(1)
            }
            NodeType::Internal { children, keys } => {
                for window in keys.windows(2) {
                    if cmp(&window[0], &window[1]) != Ordering::Less {
                        return Err(Error::CorruptPage(format!(
                            "page {} separators out of order",
                            page_id
                        )));
                    }
                }
                if let Some(key) = keys.iter().find(|k| !in_bounds(*k)) {
                    return Err(Error::CorruptPage(format!(
                        "page {} holds separator {:?} outside its bounds",
                        page_id, key
                    )));
                }

                let mut height = None;
                for (idx, &child) in children.iter().enumerate() {
                    let child_lower = if idx == 0 { lower } else { Some(&keys[idx - 1]) };
                    let child_upper = if idx == children.len() - 1 {
                        upper
                    } else {
                        Some(&keys[idx])
                    };
                    let child_height =
                        self.verify_node(child, page_id, child_lower, child_upper)?;
                    match height {
                        None => height = Some(child_height),
                        Some(h) if h != child_height => {
                            return Err(Error::CorruptPage(format!(
                                "page {} has children of uneven depth",
                                page_id
                            )));
                        }
                        Some(_) => {}
                    }
                }
                Ok(height.unwrap_or(0) + 1)
            }
        }
    }
}
