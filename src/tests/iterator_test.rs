use std::sync::Arc;

use rand::seq::SliceRandom;
use tempfile::TempDir;

use crate::{
    buffer::buffer_pool_manager::BufferPoolManager,
    index::{
        index_types::{u64_key_comparator, IndexKey, RowId},
        tree::btree::BPlusTree,
    },
    storage::disk::manager::DiskManager,
};

fn setup(pool_size: usize) -> (TempDir, Arc<BufferPoolManager>, BPlusTree) {
    let dir = TempDir::new().unwrap();
    let disk = DiskManager::new(dir.path().join("scan.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(pool_size, disk, 2));
    let tree = BPlusTree::new(
        "scan_index",
        Arc::clone(&bpm),
        u64_key_comparator(),
        4,
        4,
    )
    .unwrap();
    (dir, bpm, tree)
}

fn key_of(pair: &crate::index::index_types::KeyValuePair) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(pair.key.as_slice());
    u64::from_le_bytes(buf)
}

#[test]
fn full_scan_is_sorted() {
    let (_dir, _bpm, tree) = setup(32);
    let mut rng = rand::thread_rng();

    let mut keys: Vec<u64> = (0..100).collect();
    keys.shuffle(&mut rng);
    for &n in &keys {
        tree.insert(IndexKey::from_u64(n), RowId::new(0, n as u32)).unwrap();
    }

    let scanned: Vec<u64> = tree.begin().unwrap().map(|p| key_of(&p)).collect();
    assert_eq!((0..100).collect::<Vec<_>>(), scanned);
}

#[test]
fn scan_from_key_starts_at_or_after_it() {
    let (_dir, _bpm, tree) = setup(32);

    // Even keys only.
    for n in 0..50u64 {
        tree.insert(IndexKey::from_u64(n * 2), RowId::new(0, n as u32)).unwrap();
    }

    // Present key: the scan starts on it.
    let from_40: Vec<u64> = tree
        .begin_at(&IndexKey::from_u64(40))
        .unwrap()
        .map(|p| key_of(&p))
        .collect();
    assert_eq!((20..50).map(|n| n * 2).collect::<Vec<_>>(), from_40);

    // Absent key: the scan starts on the next larger one.
    let from_41: Vec<u64> = tree
        .begin_at(&IndexKey::from_u64(41))
        .unwrap()
        .map(|p| key_of(&p))
        .collect();
    assert_eq!((21..50).map(|n| n * 2).collect::<Vec<_>>(), from_41);

    // Past the largest key: nothing.
    assert_eq!(
        None,
        tree.begin_at(&IndexKey::from_u64(1000)).unwrap().next()
    );
}

#[test]
fn end_marks_the_far_edge() {
    let (_dir, _bpm, tree) = setup(32);

    for n in 0..20u64 {
        tree.insert(IndexKey::from_u64(n), RowId::new(0, n as u32)).unwrap();
    }
    assert_eq!(None, tree.end().unwrap().next());
}

#[test]
fn empty_tree_scans_yield_nothing() {
    let (_dir, _bpm, tree) = setup(8);

    assert_eq!(None, tree.begin().unwrap().next());
    assert_eq!(None, tree.begin_at(&IndexKey::from_u64(1)).unwrap().next());
    assert_eq!(None, tree.end().unwrap().next());
}

#[test]
fn scans_release_their_pins() {
    let (_dir, _bpm, tree) = setup(8);

    for n in 0..64u64 {
        tree.insert(IndexKey::from_u64(n), RowId::new(0, n as u32)).unwrap();
    }

    // A leaked pin would strand a frame each round and exhaust this small
    // pool quickly.
    for _ in 0..16 {
        assert_eq!(64, tree.begin().unwrap().count());
    }

    // Abandoning a scan midway must release the current leaf too.
    for _ in 0..16 {
        let mut iter = tree.begin().unwrap();
        for _ in 0..10 {
            iter.next();
        }
        drop(iter);
    }

    tree.insert(IndexKey::from_u64(64), RowId::new(0, 64)).unwrap();
    assert_eq!(65, tree.begin().unwrap().count());
}
