//! Fixed on-page layout of B+ tree nodes.
//!
//! Every node starts with a common header; the leaf and internal variants
//! extend it with their own fields and a packed entry array. Keys are
//! length-prefixed, values are fixed width.

use std::mem::size_of;

/// The size of page pointers and/or any u32 field.
pub const PTR_SIZE: usize = size_of::<u32>();

#[derive(Debug)]
pub enum NodeHeader {
    NodeType,
    ParentPointer,
    MaxSize,
}

impl NodeHeader {
    pub fn size(&self) -> usize {
        match *self {
            NodeHeader::NodeType => NODE_TYPE_SIZE,
            NodeHeader::ParentPointer => PARENT_POINTER_SIZE,
            NodeHeader::MaxSize => MAX_SIZE_SIZE,
        }
    }

    pub fn offset(&self) -> usize {
        match *self {
            NodeHeader::NodeType => NODE_TYPE_OFFSET,
            NodeHeader::ParentPointer => PARENT_POINTER_OFFSET,
            NodeHeader::MaxSize => MAX_SIZE_OFFSET,
        }
    }
}

pub const NODE_TYPE_SIZE: usize = 1;
pub const NODE_TYPE_OFFSET: usize = 0;
pub const PARENT_POINTER_SIZE: usize = PTR_SIZE;
pub const PARENT_POINTER_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const MAX_SIZE_SIZE: usize = PTR_SIZE;
pub const MAX_SIZE_OFFSET: usize = PARENT_POINTER_OFFSET + PARENT_POINTER_SIZE;

pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + PARENT_POINTER_SIZE + MAX_SIZE_SIZE;

#[derive(Debug)]
pub enum LeafNodeHeader {
    NumPairs,
    NextLeafPointer,
}

impl LeafNodeHeader {
    pub fn size(&self) -> usize {
        match *self {
            LeafNodeHeader::NumPairs => LEAF_NODE_NUM_PAIRS_SIZE,
            LeafNodeHeader::NextLeafPointer => NEXT_LEAF_POINTER_SIZE,
        }
    }

    pub fn offset(&self) -> usize {
        match *self {
            LeafNodeHeader::NumPairs => LEAF_NODE_NUM_PAIRS_OFFSET,
            LeafNodeHeader::NextLeafPointer => NEXT_LEAF_POINTER_OFFSET,
        }
    }
}

pub const LEAF_NODE_NUM_PAIRS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NUM_PAIRS_SIZE: usize = PTR_SIZE;

pub const NEXT_LEAF_POINTER_OFFSET: usize = LEAF_NODE_NUM_PAIRS_OFFSET + LEAF_NODE_NUM_PAIRS_SIZE;
pub const NEXT_LEAF_POINTER_SIZE: usize = PTR_SIZE;

pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_PAIRS_SIZE + NEXT_LEAF_POINTER_SIZE;

#[derive(Debug)]
pub enum InternalNodeHeader {
    NumChildren,
}

impl InternalNodeHeader {
    pub fn size(&self) -> usize {
        match *self {
            InternalNodeHeader::NumChildren => INTERNAL_NODE_NUM_CHILDREN_SIZE,
        }
    }

    pub fn offset(&self) -> usize {
        match *self {
            InternalNodeHeader::NumChildren => INTERNAL_NODE_NUM_CHILDREN_OFFSET,
        }
    }
}

pub const INTERNAL_NODE_NUM_CHILDREN_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_NUM_CHILDREN_SIZE: usize = PTR_SIZE;

pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_CHILDREN_SIZE;

/// Node type tags.
pub const INTERNAL_NODE_TAG: u8 = 0x01;
pub const LEAF_NODE_TAG: u8 = 0x02;
