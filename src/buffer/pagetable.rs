use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};

use crate::error::Result;

/// A bucket holds up to `bucket_size` entries whose hashes agree on the low
/// `depth` bits. Buckets are shared: several directory slots may alias the
/// same bucket through an Arc handle.
struct Bucket<K, V> {
    data: RwLock<BucketData<K, V>>,
}

impl<K, V> Bucket<K, V> {
    fn new(depth: usize) -> Self {
        Bucket { data: RwLock::new(BucketData { depth, items: Vec::new() }) }
    }
}

struct BucketData<K, V> {
    /// Local depth: the number of hash bits discriminating this bucket's
    /// membership. Always <= the directory's global depth.
    depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq + Clone, V: Clone> BucketData<K, V> {
    /// Overwrite the value if the key is present, append otherwise. Return
    /// false if the bucket is full and the key absent.
    fn put(&mut self, key: &K, value: &V, capacity: usize) -> bool {
        for item in self.items.iter_mut() {
            if item.0 == *key {
                item.1 = value.clone();
                return true;
            }
        }
        if self.items.len() < capacity {
            self.items.push((key.clone(), value.clone()));
            return true;
        }
        false
    }
}

struct Directory<K, V> {
    /// The directory holds 2^global_depth bucket handles.
    global_depth: usize,
    num_buckets: usize,
    buckets: Vec<Arc<Bucket<K, V>>>,
}

impl<K: Hash, V> Directory<K, V> {
    /// Directory slot of the key: the low global_depth bits of its hash.
    fn index_of(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & ((1 << self.global_depth) - 1)
    }
}

/// A concurrent hash map built as an extendible hash table: a directory of
/// shared bucket handles that doubles when a full bucket's local depth
/// catches up with the global depth. Chosen over a closed-address map for
/// its predictable worst case and per-bucket locking.
///
/// The directory mutex is held only to resolve a bucket handle (or to
/// restructure the directory during a split); bucket latches are acquired
/// before the directory lock is released, so lookups on different buckets
/// proceed in parallel.
pub struct ExtendibleHashTable<K, V> {
    bucket_size: usize,
    dir: Mutex<Directory<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> ExtendibleHashTable<K, V> {
    /// Create a table with a single bucket of the given capacity at global
    /// depth zero.
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be larger than zero");
        let dir = Directory {
            global_depth: 0,
            num_buckets: 1,
            buckets: vec![Arc::new(Bucket::new(0))],
        };
        ExtendibleHashTable { bucket_size, dir: Mutex::new(dir) }
    }

    /// Look up the value for a key.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let dir = self.dir.lock()?;
        let idx = dir.index_of(key);
        let bucket = Arc::clone(&dir.buckets[idx]);
        let guard = bucket.data.read()?;
        drop(dir);
        Ok(guard.items.iter().find(|(k, _)| *k == *key).map(|(_, v)| v.clone()))
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let dir = self.dir.lock()?;
        let idx = dir.index_of(key);
        let bucket = Arc::clone(&dir.buckets[idx]);
        let mut guard = bucket.data.write()?;
        drop(dir);
        match guard.items.iter().position(|(k, _)| *k == *key) {
            Some(pos) => {
                guard.items.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert a key/value pair, overwriting any existing value. A full
    /// bucket is split, doubling the directory when its local depth would
    /// exceed the global depth; the split may cascade, so the insert
    /// retries until the key lands.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let mut dir = self.dir.lock()?;
        loop {
            let idx = dir.index_of(&key);
            let bucket = Arc::clone(&dir.buckets[idx]);
            let mut guard = bucket.data.write()?;
            if guard.put(&key, &value, self.bucket_size) {
                return Ok(());
            }

            // The bucket is full: raise its local depth and split it.
            guard.depth += 1;
            let local_depth = guard.depth;
            debug!("bucket at slot {} is full, splitting to local depth {}", idx, local_depth);
            if local_depth > dir.global_depth {
                // Double the directory; each new slot aliases its low-bit twin.
                let old_size = dir.buckets.len();
                for i in 0..old_size {
                    let twin = Arc::clone(&dir.buckets[i]);
                    dir.buckets.push(twin);
                }
                dir.global_depth += 1;
                debug!("directory doubled to global depth {}", dir.global_depth);
            }

            // The sibling takes over every slot agreeing with the paired
            // index on the low local_depth bits.
            let pair_index = idx ^ (1 << (local_depth - 1));
            let sibling = Arc::new(Bucket::new(local_depth));
            dir.num_buckets += 1;
            let stride = 1 << local_depth;
            let mut slot = pair_index & (stride - 1);
            while slot < dir.buckets.len() {
                dir.buckets[slot] = Arc::clone(&sibling);
                slot += stride;
            }

            // Redistribute the old bucket's entries between the two halves
            // by recomputing their slot, then retry the pending key.
            let items = std::mem::take(&mut guard.items);
            drop(guard);
            for (k, v) in items {
                let target_idx = dir.index_of(&k);
                let target = Arc::clone(&dir.buckets[target_idx]);
                let mut target_guard = target.data.write()?;
                if !target_guard.put(&k, &v, self.bucket_size) {
                    warn!("redistributed entry overflows bucket at slot {}", target_idx);
                }
            }
        }
    }

    /// The directory's addressing width.
    pub fn global_depth(&self) -> Result<usize> {
        let dir = self.dir.lock()?;
        Ok(dir.global_depth)
    }

    /// Local depth of the bucket referenced by the given directory slot.
    pub fn local_depth(&self, dir_index: usize) -> Result<usize> {
        let dir = self.dir.lock()?;
        let bucket = Arc::clone(&dir.buckets[dir_index]);
        let guard = bucket.data.read()?;
        drop(dir);
        Ok(guard.depth)
    }

    /// Number of distinct buckets behind the directory.
    pub fn num_buckets(&self) -> Result<usize> {
        let dir = self.dir.lock()?;
        Ok(dir.num_buckets)
    }

    /// Number of entries across all buckets.
    pub fn len(&self) -> Result<usize> {
        let dir = self.dir.lock()?;
        let mut seen = std::collections::HashSet::new();
        let mut total = 0;
        for bucket in &dir.buckets {
            if seen.insert(Arc::as_ptr(bucket)) {
                total += bucket.data.read()?.items.len();
            }
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
