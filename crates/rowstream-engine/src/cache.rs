use lru::LruCache;
use rowstream_sdk::{DatasetError, PartitionReader, Result, Table, TensorBatch};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Capacities for the three cache layers.
///
/// `partition`: `None` means unbounded (the default, for datasets that fit
/// in memory). The assembly and tensor layers default to a single entry —
/// consecutive batches rarely share an assembly key, so one slot covers
/// repeated requests for the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub partition: Option<usize>,
    pub assembled: usize,
    pub materialized: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            partition: None,
            assembled: 1,
            materialized: 1,
        }
    }
}

/// The concatenation of the partitions covering one batch, stamped with an
/// assembly generation.
///
/// The generation increases every time the assembly cache computes a fresh
/// value, so it identifies the specific concatenated table — not merely its
/// key. The tensor cache keys on it; after an eviction-and-recompute of the
/// same id tuple the generation differs and a stale tensor can never be
/// served.
#[derive(Clone, Debug)]
pub struct AssembledBatch {
    pub generation: u64,
    pub table: Arc<Table>,
}

type TensorKey = (u64, usize, usize);

/// Three layered, independently bounded, memoizing caches.
///
/// Each lookup is get-or-compute; eviction never changes the value a key
/// resolves to, only the cost of the next lookup. Each map is guarded by a
/// mutex held across the miss computation, so concurrent identical lookups
/// perform at most one computation per key.
#[derive(Debug)]
pub struct CacheHierarchy {
    partitions: Mutex<LruCache<String, Arc<Table>>>,
    assembled: Mutex<LruCache<Vec<String>, AssembledBatch>>,
    tensors: Mutex<LruCache<TensorKey, Arc<TensorBatch>>>,
    generation: AtomicU64,
}

fn bounded<K: Hash + Eq, V>(capacity: Option<usize>, name: &str) -> Result<LruCache<K, V>> {
    match capacity {
        None => Ok(LruCache::unbounded()),
        Some(n) => {
            let n = NonZeroUsize::new(n).ok_or_else(|| {
                DatasetError::config(format!("{name} cache capacity must be positive"))
            })?;
            Ok(LruCache::new(n))
        }
    }
}

impl CacheHierarchy {
    pub fn new(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            partitions: Mutex::new(bounded(config.partition, "partition")?),
            assembled: Mutex::new(bounded(Some(config.assembled), "batch-assembly")?),
            tensors: Mutex::new(bounded(Some(config.materialized), "materialized-range")?),
            generation: AtomicU64::new(0),
        })
    }

    /// One partition's table, read through `reader` on a miss.
    pub fn partition(&self, id: &str, reader: &dyn PartitionReader) -> Result<Arc<Table>> {
        let mut cache = self.partitions.lock().expect("partition cache poisoned");
        if let Some(table) = cache.get(id) {
            return Ok(Arc::clone(table));
        }
        debug!(partition = id, "partition cache miss");
        let table = Arc::new(reader.read(id)?);
        cache.put(id.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Pre-populate the partition cache (eager-load path); an existing entry
    /// wins so a table is never replaced mid-run.
    pub fn warm_partition(&self, id: &str, table: Arc<Table>) {
        let mut cache = self.partitions.lock().expect("partition cache poisoned");
        if cache.get(id).is_none() {
            cache.put(id.to_string(), table);
        }
    }

    /// The concatenation of `ids`, keyed by the exact ordered tuple. Two
    /// requests with the same multiset but different order are different
    /// keys — order decides row order. The miss path populates the
    /// partition cache as a side effect.
    pub fn assembled(&self, ids: &[String], reader: &dyn PartitionReader) -> Result<AssembledBatch> {
        let mut cache = self.assembled.lock().expect("assembly cache poisoned");
        if let Some(entry) = cache.get(ids) {
            return Ok(entry.clone());
        }
        debug!(?ids, "batch-assembly cache miss");
        let tables = ids
            .iter()
            .map(|id| self.partition(id, reader))
            .collect::<Result<Vec<_>>>()?;
        let entry = AssembledBatch {
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
            table: Arc::new(Table::concat(&tables)?),
        };
        cache.put(ids.to_vec(), entry.clone());
        Ok(entry)
    }

    /// The final delivery batch for rows `[rel_start, rel_end)` of the
    /// assembled table identified by `generation`.
    pub fn materialized<F>(&self, key: TensorKey, compute: F) -> Result<Arc<TensorBatch>>
    where
        F: FnOnce() -> Result<TensorBatch>,
    {
        let mut cache = self.tensors.lock().expect("tensor cache poisoned");
        if let Some(tensor) = cache.get(&key) {
            return Ok(Arc::clone(tensor));
        }
        debug!(
            generation = key.0,
            rel_start = key.1,
            rel_end = key.2,
            "materialized-range cache miss"
        );
        let tensor = Arc::new(compute()?);
        cache.put(key, Arc::clone(&tensor));
        Ok(tensor)
    }

    #[cfg(test)]
    pub(crate) fn partition_entries(&self) -> usize {
        self.partitions.lock().unwrap().len()
    }
}
