use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use anyhow::bail;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    index::{
        index_types::{IndexKey, KeyValuePair, RowId},
        tree::{
            node::{Node, NodeType},
            tree_page_layout::{
                InternalNodeHeader, LeafNodeHeader, NodeHeader, INTERNAL_NODE_HEADER_SIZE,
                INTERNAL_NODE_TAG, LEAF_NODE_HEADER_SIZE, LEAF_NODE_TAG,
            },
        },
    },
    storage::page::page::PageId,
};

/// Translates between page bytes and the in-memory node view.
///
/// Internal layout interleaves child pointers with length-prefixed keys;
/// the last child carries no trailing key. Leaf layout packs
/// (key length, key, row id) triples after the header.
pub struct Codec;

impl Codec {
    pub fn decode(page_id: PageId, raw: &[u8]) -> anyhow::Result<Node> {
        let mut cursor = Cursor::new(raw);

        cursor.seek(SeekFrom::Start(NodeHeader::NodeType.offset() as u64))?;
        let tag = cursor.read_u8()?;

        cursor.seek(SeekFrom::Start(NodeHeader::ParentPointer.offset() as u64))?;
        let parent = cursor.read_u32::<LittleEndian>()?;

        cursor.seek(SeekFrom::Start(NodeHeader::MaxSize.offset() as u64))?;
        let max_size = cursor.read_u32::<LittleEndian>()? as usize;

        match tag {
            INTERNAL_NODE_TAG => {
                cursor.seek(SeekFrom::Start(InternalNodeHeader::NumChildren.offset() as u64))?;
                let num_children = cursor.read_u32::<LittleEndian>()?;

                let mut children: Vec<PageId> = Vec::with_capacity(num_children as usize);
                let mut keys: Vec<IndexKey> = Vec::new();

                cursor.seek(SeekFrom::Start(INTERNAL_NODE_HEADER_SIZE as u64))?;
                for child_idx in 0..num_children {
                    children.push(cursor.read_u32::<LittleEndian>()?);

                    if child_idx == num_children - 1 {
                        break;
                    }
                    let key_len = cursor.read_u32::<LittleEndian>()? as usize;
                    let mut buf = vec![0u8; key_len];
                    cursor.read_exact(&mut buf)?;
                    keys.push(IndexKey::from_bytes(buf));
                }

                Ok(Node {
                    node_type: NodeType::Internal { children, keys },
                    page_id,
                    parent,
                    max_size,
                })
            }

            LEAF_NODE_TAG => {
                cursor.seek(SeekFrom::Start(LeafNodeHeader::NumPairs.offset() as u64))?;
                let num_pairs = cursor.read_u32::<LittleEndian>()?;

                cursor.seek(SeekFrom::Start(LeafNodeHeader::NextLeafPointer.offset() as u64))?;
                let next = cursor.read_u32::<LittleEndian>()?;

                let mut entries = Vec::with_capacity(num_pairs as usize);
                cursor.seek(SeekFrom::Start(LEAF_NODE_HEADER_SIZE as u64))?;
                for _ in 0..num_pairs {
                    let key_len = cursor.read_u32::<LittleEndian>()? as usize;
                    let mut buf = vec![0u8; key_len];
                    cursor.read_exact(&mut buf)?;

                    let row_page = cursor.read_u32::<LittleEndian>()?;
                    let row_slot = cursor.read_u32::<LittleEndian>()?;

                    entries.push(KeyValuePair::new(
                        IndexKey::from_bytes(buf),
                        RowId::new(row_page, row_slot),
                    ));
                }

                Ok(Node {
                    node_type: NodeType::Leaf { entries, next },
                    page_id,
                    parent,
                    max_size,
                })
            }

            other => bail!("page {} has unknown node tag {:#04x}", page_id, other),
        }
    }

    pub fn encode(node: &Node, raw: &mut [u8]) -> anyhow::Result<()> {
        raw.fill(0);
        let mut cursor = Cursor::new(raw);

        cursor.seek(SeekFrom::Start(NodeHeader::NodeType.offset() as u64))?;
        let tag = match node.node_type {
            NodeType::Internal { .. } => INTERNAL_NODE_TAG,
            NodeType::Leaf { .. } => LEAF_NODE_TAG,
        };
        cursor.write_u8(tag)?;

        cursor.seek(SeekFrom::Start(NodeHeader::ParentPointer.offset() as u64))?;
        cursor.write_u32::<LittleEndian>(node.parent)?;

        cursor.seek(SeekFrom::Start(NodeHeader::MaxSize.offset() as u64))?;
        cursor.write_u32::<LittleEndian>(node.max_size as u32)?;

        match &node.node_type {
            NodeType::Internal { children, keys } => {
                cursor.seek(SeekFrom::Start(InternalNodeHeader::NumChildren.offset() as u64))?;
                cursor.write_u32::<LittleEndian>(children.len() as u32)?;

                cursor.seek(SeekFrom::Start(INTERNAL_NODE_HEADER_SIZE as u64))?;
                for (child_idx, child) in children.iter().enumerate() {
                    cursor.write_u32::<LittleEndian>(*child)?;

                    if child_idx == children.len() - 1 {
                        continue;
                    }
                    let key = &keys[child_idx];
                    cursor.write_u32::<LittleEndian>(key.len() as u32)?;
                    cursor.write_all(key.as_slice())?;
                }
            }

            NodeType::Leaf { entries, next } => {
                cursor.seek(SeekFrom::Start(LeafNodeHeader::NumPairs.offset() as u64))?;
                cursor.write_u32::<LittleEndian>(entries.len() as u32)?;

                cursor.seek(SeekFrom::Start(LeafNodeHeader::NextLeafPointer.offset() as u64))?;
                cursor.write_u32::<LittleEndian>(*next)?;

                cursor.seek(SeekFrom::Start(LEAF_NODE_HEADER_SIZE as u64))?;
                for pair in entries {
                    cursor.write_u32::<LittleEndian>(pair.key.len() as u32)?;
                    cursor.write_all(pair.key.as_slice())?;
                    cursor.write_u32::<LittleEndian>(pair.value.page_id)?;
                    cursor.write_u32::<LittleEndian>(pair.value.slot)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Codec;
    use crate::{
        index::{
            index_types::{IndexKey, KeyValuePair, RowId},
            tree::node::{Node, NodeType},
        },
        storage::page::page::{page_constants::PAGE_SIZE, INVALID_PAGE_ID},
    };

    #[test]
    fn leaf_round_trip() {
        let mut node = Node::new_leaf(7, 3, 32);
        if let NodeType::Leaf { entries, next } = &mut node.node_type {
            for i in 0..5u64 {
                entries.push(KeyValuePair::new(
                    IndexKey::from_u64(i * 2),
                    RowId::new(i as u32, (i * 7) as u32),
                ));
            }
            *next = 11;
        }

        let mut raw = vec![0u8; PAGE_SIZE];
        Codec::encode(&node, &mut raw).unwrap();
        let decoded = Codec::decode(7, &raw).unwrap();

        assert_eq!(node.node_type, decoded.node_type);
        assert_eq!(3, decoded.parent);
        assert_eq!(32, decoded.max_size);
        assert_eq!(7, decoded.page_id);
    }

    #[test]
    fn internal_round_trip() {
        let mut node = Node::new_internal(9, INVALID_PAGE_ID, 16);
        if let NodeType::Internal { children, keys } = &mut node.node_type {
            *children = vec![2, 4, 6, 8];
            *keys = vec![
                IndexKey::from_u64(10),
                IndexKey::from_u64(20),
                IndexKey::from_u64(30),
            ];
        }

        let mut raw = vec![0u8; PAGE_SIZE];
        Codec::encode(&node, &mut raw).unwrap();
        let decoded = Codec::decode(9, &raw).unwrap();

        assert_eq!(node.node_type, decoded.node_type);
        assert_eq!(INVALID_PAGE_ID, decoded.parent);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let raw = vec![0xffu8; PAGE_SIZE];
        assert!(Codec::decode(1, &raw).is_err());
    }
}
