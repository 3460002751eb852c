use std::{cmp::Ordering, sync::Arc};

use bytes::Bytes;

/// An index key as stored on a page: opaque bytes whose ordering is decided
/// by the tree's comparator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexKey(Bytes);

impl IndexKey {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        IndexKey(bytes.into())
    }

    pub fn from_u64(key: u64) -> Self {
        IndexKey(Bytes::copy_from_slice(&key.to_le_bytes()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Page number and slot index of a record in its table heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: u32,
    pub slot: u32,
}

impl RowId {
    pub fn new(page_id: u32, slot: u32) -> Self {
        RowId { page_id, slot }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: IndexKey,
    pub value: RowId,
}

impl KeyValuePair {
    pub fn new(key: IndexKey, value: RowId) -> Self {
        KeyValuePair { key, value }
    }
}

/// Key ordering supplied by the caller. Keys are compared only through
/// this; their byte encoding carries no intrinsic order.
pub type KeyCmpFn = dyn Fn(&IndexKey, &IndexKey) -> Ordering + Send + Sync;
pub type KeyComparator = Arc<KeyCmpFn>;

/// Comparator for keys built with `IndexKey::from_u64`.
pub fn u64_key_comparator() -> KeyComparator {
    fn decode(key: &IndexKey) -> u64 {
        let mut buf = [0u8; 8];
        let raw = key.as_slice();
        buf[..raw.len().min(8)].copy_from_slice(&raw[..raw.len().min(8)]);
        u64::from_le_bytes(buf)
    }
    Arc::new(|a, b| decode(a).cmp(&decode(b)))
}

/// Comparator ordering keys by their raw bytes.
pub fn bytes_key_comparator() -> KeyComparator {
    Arc::new(|a, b| a.as_slice().cmp(b.as_slice()))
}
