use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

/// A bounded list of (key, value) pairs sharing the low `depth` hash bits.
struct Bucket<K, V> {
    depth: usize,
    capacity: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(capacity: usize, depth: usize) -> Self {
        Bucket {
            depth,
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Overwrites in place when the key is present, appends otherwise.
    /// A full bucket hands the pair back to the caller.
    fn insert(&mut self, key: K, value: V) -> Result<(), (K, V)> {
        if let Some(slot) = self.items.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return Ok(());
        }
        if self.items.len() >= self.capacity {
            return Err((key, value));
        }
        self.items.push((key, value));
        Ok(())
    }
}

type BucketRef<K, V> = Arc<Mutex<Bucket<K, V>>>;

struct Directory<K, V> {
    global_depth: usize,
    bucket_size: usize,
    num_buckets: usize,
    // 2^global_depth slots; several slots may share one bucket. A bucket is
    // dropped once a split replaces its last remaining reference.
    dir: Vec<BucketRef<K, V>>,
}

impl<K: Hash, V> Directory<K, V> {
    fn index_of(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let mask = (1usize << self.global_depth) - 1;
        (hasher.finish() as usize) & mask
    }
}

/// Extendible hash table mapping K to V.
///
/// The directory grows by doubling whenever an overflowing bucket already
/// consults as many hash bits as the directory does. A single latch
/// serializes every operation; the buffer pool issues at most one call per
/// operation of its own, so the coarse latch is sufficient.
pub struct ExtendibleHashTable<K, V> {
    inner: Mutex<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        let inner = Directory {
            global_depth: 0,
            bucket_size,
            num_buckets: 1,
            dir: vec![Arc::new(Mutex::new(Bucket::new(bucket_size, 0)))],
        };
        ExtendibleHashTable {
            inner: Mutex::new(inner),
        }
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().unwrap();
        let bucket = Arc::clone(&inner.dir[inner.index_of(key)]);
        let guard = bucket.lock().unwrap();
        guard.find(key).cloned()
    }

    /// Inserts or overwrites. A full bucket is split until the pair fits,
    /// doubling the directory whenever the bucket's local depth has caught
    /// up with the global depth.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();
        let mut pending = (key, value);

        loop {
            let idx = inner.index_of(&pending.0);
            let bucket = Arc::clone(&inner.dir[idx]);
            let mut guard = bucket.lock().unwrap();
            pending = match guard.insert(pending.0, pending.1) {
                Ok(()) => return,
                Err(pair) => pair,
            };

            let local_depth = guard.depth;
            if local_depth == inner.global_depth {
                // Double the directory: slot i and slot i + 2^(g-1) keep
                // sharing their bucket until a split separates them.
                inner.global_depth += 1;
                let half = inner.dir.len();
                for i in 0..half {
                    let shared = Arc::clone(&inner.dir[i]);
                    inner.dir.push(shared);
                }
            }

            // The overflowing bucket's directory pattern before the split.
            let pattern = idx & ((1usize << local_depth) - 1);
            let drained: Vec<(K, V)> = std::mem::take(&mut guard.items);
            guard.depth += 1;
            let new_depth = guard.depth;
            drop(guard);

            // One sibling bucket takes over every slot matching the split
            // image (old pattern with the new high bit set).
            let sibling: BucketRef<K, V> =
                Arc::new(Mutex::new(Bucket::new(inner.bucket_size, new_depth)));
            inner.num_buckets += 1;
            let image = pattern | (1usize << (new_depth - 1));
            let mask = (1usize << new_depth) - 1;
            for i in 0..inner.dir.len() {
                if i & mask == image {
                    inner.dir[i] = Arc::clone(&sibling);
                }
            }

            // Rehash the drained entries through the refreshed directory.
            for (k, v) in drained {
                let target = Arc::clone(&inner.dir[inner.index_of(&k)]);
                if target.lock().unwrap().insert(k, v).is_err() {
                    unreachable!("a split bucket received more entries than it lost");
                }
            }
            // Retry the pending pair against the refreshed directory.
        }
    }

    pub fn remove(&self, key: &K) -> bool {
        let inner = self.inner.lock().unwrap();
        let bucket = Arc::clone(&inner.dir[inner.index_of(key)]);
        let mut guard = bucket.lock().unwrap();
        guard.remove(key)
    }

    pub fn global_depth(&self) -> usize {
        self.inner.lock().unwrap().global_depth
    }

    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        let bucket = Arc::clone(&inner.dir[dir_index]);
        let depth = bucket.lock().unwrap().depth;
        depth
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.lock().unwrap().num_buckets
    }
}

#[cfg(test)]
mod test {
    use super::ExtendibleHashTable;

    #[test]
    fn find_returns_last_inserted_value() {
        let table: ExtendibleHashTable<u32, String> = ExtendibleHashTable::new(4);

        table.insert(1, "a".to_string());
        table.insert(2, "b".to_string());
        assert_eq!(Some("a".to_string()), table.find(&1));
        assert_eq!(Some("b".to_string()), table.find(&2));
        assert_eq!(None, table.find(&3));

        table.insert(1, "c".to_string());
        assert_eq!(Some("c".to_string()), table.find(&1));
    }

    #[test]
    fn remove_deletes_single_entry() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        table.insert(8, 80);
        assert!(table.remove(&8));
        assert_eq!(None, table.find(&8));
        assert!(!table.remove(&8));
    }

    #[test]
    fn splits_grow_the_directory() {
        let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(2);

        // With two-entry buckets, 64 keys force several directory
        // doublings no matter how the hashes land.
        let mut buckets_seen = table.num_buckets();
        for key in 0..64u64 {
            table.insert(key, key * 10);
            let now = table.num_buckets();
            assert!(now >= buckets_seen, "bucket count shrank");
            buckets_seen = now;

            // Every key inserted so far survives every split.
            for probe in 0..=key {
                assert_eq!(Some(probe * 10), table.find(&probe));
            }
        }

        assert!(table.global_depth() >= 2);
        assert!(table.num_buckets() > 4);

        // Local depth never exceeds the global depth.
        for dir_index in 0..(1usize << table.global_depth()) {
            assert!(table.local_depth(dir_index) <= table.global_depth());
        }
    }

    #[test]
    fn overwrites_survive_splits() {
        let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(2);

        for key in 0..32u64 {
            table.insert(key, key);
        }
        for key in 0..32u64 {
            table.insert(key, key + 100);
        }
        for key in 0..32u64 {
            assert_eq!(Some(key + 100), table.find(&key));
        }
    }
}
