use crate::boundary::BoundaryIndex;
use crate::cache::{CacheConfig, CacheHierarchy};
use crate::io::{self, ReaderFactory};
use crate::range::{self, RowRange};
use crate::shard;
use crate::spec::DatasetSpec;
use rayon::prelude::*;
use rowstream_sdk::{
    BatchConverter, DatasetError, NumericConverter, PartitionReader, Result, TensorBatch,
};
use std::sync::Arc;
use tracing::trace;

/// The row-range cursor threaded through each step.
///
/// An explicit value rather than ambient mutable state: a step computes its
/// successor and the iterator swaps it in only after the step has fully
/// succeeded, so a failed step leaves the cursor where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Global row range `[start, end)` of the next batch.
    pub start: usize,
    pub end: usize,
    /// Batches left to produce; `None` means unbounded.
    pub remaining: Option<u64>,
}

/// Streams fixed-size row batches out of an ordered partition list.
///
/// Drives the boundary index, the range splitter and the cache hierarchy:
/// one call to [`next_batch`](Self::next_batch) extends the frontier as far
/// as the cursor requires, resolves the covering partitions, assembles and
/// slices them, and yields the converted batch. Once the frontier is fully
/// materialized the cursor advances modulo the dataset total, so iteration
/// cycles indefinitely.
///
/// The protocol is sequential: one instance supports one in-flight step at a
/// time (`next_batch` takes `&mut self`). Independent instances share
/// nothing.
pub struct BatchIterator {
    partitions: Vec<String>,
    reader: Arc<dyn PartitionReader>,
    converter: Arc<dyn BatchConverter>,
    boundary: BoundaryIndex,
    caches: CacheHierarchy,
    batch_size: usize,
    cursor: Cursor,
    exhausted: bool,
}

impl std::fmt::Debug for BatchIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIterator")
            .field("partitions", &self.partitions)
            .field("boundary", &self.boundary)
            .field("caches", &self.caches)
            .field("batch_size", &self.batch_size)
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl BatchIterator {
    /// Open a dataset from its spec: expand the glob, take this worker's
    /// shard, and build the format-appropriate reader. All configuration
    /// errors surface here.
    pub fn open(spec: &DatasetSpec) -> Result<Self> {
        spec.validate()?;
        let partitions = io::discover_partitions(&spec.glob)?;
        let partitions = shard::assign(partitions, spec.worker, spec.replicas)?;
        let reader = ReaderFactory::create(spec)?;
        Self::with_reader(partitions, reader, Arc::new(NumericConverter), spec)
    }

    /// Build an iterator over an explicit partition list with an injected
    /// reader and converter. `open` delegates here; embedders and tests use
    /// it directly.
    pub fn with_reader(
        partitions: Vec<String>,
        reader: Arc<dyn PartitionReader>,
        converter: Arc<dyn BatchConverter>,
        spec: &DatasetSpec,
    ) -> Result<Self> {
        spec.validate()?;
        if partitions.is_empty() {
            return Err(DatasetError::config(
                "no partitions assigned to this worker",
            ));
        }

        let caches = CacheHierarchy::new(CacheConfig {
            partition: spec.partition_cache,
            assembled: spec.batch_cache,
            materialized: spec.tensor_cache,
        })?;

        let mut boundary = BoundaryIndex::new();
        if spec.eager_load {
            // Fetch partitions in parallel, then append counts in partition
            // order; the boundary index itself stays sequential.
            let tables: Vec<Arc<rowstream_sdk::Table>> = partitions
                .par_iter()
                .map(|id| reader.read(id).map(Arc::new))
                .collect::<Result<_>>()?;
            for (id, table) in partitions.iter().zip(&tables) {
                caches.warm_partition(id, Arc::clone(table));
            }
            let mut next = 0;
            boundary.extend_in_full(&partitions, |_| {
                let rows = tables[next].num_rows();
                next += 1;
                Ok(rows)
            })?;
        }

        let batch_size = match spec.batch_size {
            Some(size) => size,
            // validate() guarantees eager_load when the size is omitted.
            None => boundary.total_rows(),
        };
        if boundary.is_fully_materialized(partitions.len()) && batch_size > boundary.total_rows() {
            return Err(DatasetError::config(format!(
                "batch size {batch_size} exceeds the dataset's {} rows",
                boundary.total_rows()
            )));
        }

        Ok(Self {
            partitions,
            reader,
            converter,
            boundary,
            caches,
            batch_size,
            cursor: Cursor {
                start: 0,
                end: batch_size,
                remaining: spec.iterations,
            },
            exhausted: false,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dataset total, known only once the frontier is fully materialized.
    pub fn total_rows(&self) -> Option<usize> {
        self.boundary
            .is_fully_materialized(self.partitions.len())
            .then(|| self.boundary.total_rows())
    }

    /// Number of partitions whose row counts have been discovered.
    pub fn materialized_partitions(&self) -> usize {
        self.boundary.materialized_partitions()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Produce the next batch, or `None` once the iteration budget is spent.
    ///
    /// A step either fully succeeds or fully fails: on a source error the
    /// cursor, boundary index and caches are left exactly as they were, so
    /// the caller may retry or abandon the run.
    pub fn next_batch(&mut self) -> Result<Option<TensorBatch>> {
        if self.exhausted {
            return Ok(None);
        }
        let cursor = self.cursor;

        if !self.boundary.is_fully_materialized(self.partitions.len()) {
            let caches = &self.caches;
            let reader = &self.reader;
            self.boundary
                .extend_until_covers(cursor.start, &self.partitions, |id| {
                    caches.partition(id, &**reader).map(|t| t.num_rows())
                })?;
            self.boundary
                .extend_until_covers(cursor.end, &self.partitions, |id| {
                    caches.partition(id, &**reader).map(|t| t.num_rows())
                })?;
        }

        if self.boundary.materialized_partitions() == 0 {
            // Construction rejected empty partition lists, so an empty
            // frontier after extension is a core bug, not an empty stream.
            self.exhausted = true;
            return Err(DatasetError::invariant(
                "boundary extension discovered no partitions",
            ));
        }

        let total = self.boundary.total_rows();
        if self.boundary.is_fully_materialized(self.partitions.len()) && self.batch_size > total {
            self.exhausted = true;
            return Err(DatasetError::config(format!(
                "batch size {} exceeds the dataset's {total} rows",
                self.batch_size
            )));
        }

        let ranges = range::split(RowRange::new(cursor.start, cursor.end), total);
        let mut ids: Vec<String> = Vec::new();
        for sub in &ranges {
            if sub.is_empty() {
                continue;
            }
            let (first, last) = range::partition_span(*sub, &self.boundary);
            ids.extend(self.partitions[first..=last].iter().cloned());
        }

        let assembled = self.caches.assembled(&ids, &*self.reader)?;

        // Relative offsets inside the assembled table: its first row is the
        // global row at the base boundary of the leading sub-range.
        let lead = ranges[0];
        let base = self.boundary.entries()[self.boundary.locate(lead.start)];
        let rel_start = lead.start - base;
        let rel_end = rel_start + self.batch_size;

        let table = Arc::clone(&assembled.table);
        let converter = Arc::clone(&self.converter);
        let tensor = self
            .caches
            .materialized((assembled.generation, rel_start, rel_end), move || {
                converter.convert(&table.slice(rel_start, rel_end - rel_start))
            })?;

        // The step succeeded: spend the budget and advance the cursor.
        let remaining = cursor.remaining.map(|r| r.saturating_sub(1));
        if remaining == Some(0) {
            self.exhausted = true;
        }
        self.cursor = self.advanced(cursor, remaining);
        trace!(
            start = cursor.start,
            end = cursor.end,
            rel_start,
            rel_end,
            "produced batch"
        );
        Ok(Some(tensor.as_ref().clone()))
    }

    /// The successor cursor: modulo the total once the frontier is complete
    /// (cyclic re-iteration), linear while the dataset is still growing from
    /// the consumer's point of view.
    fn advanced(&self, cursor: Cursor, remaining: Option<u64>) -> Cursor {
        if self.boundary.is_fully_materialized(self.partitions.len()) {
            let start = cursor.end % self.boundary.total_rows();
            Cursor {
                start,
                end: start + self.batch_size,
                remaining,
            }
        } else {
            Cursor {
                start: cursor.end,
                end: cursor.end + self.batch_size,
                remaining,
            }
        }
    }
}

impl Iterator for BatchIterator {
    type Item = Result<TensorBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use rowstream_sdk::Table;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A table holding one f64 column "x" with values start, start+1, ...
    /// so a batch's contents encode the global rows it came from.
    fn seq_table(start: usize, rows: usize) -> Table {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "x",
            DataType::Float64,
            false,
        )]));
        let values: Vec<f64> = (start..start + rows).map(|v| v as f64).collect();
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values))]).unwrap();
        Table::new(batch)
    }

    struct MockReader {
        tables: HashMap<String, Table>,
        reads: Mutex<HashMap<String, usize>>,
        fail: Option<String>,
    }

    impl MockReader {
        fn total_reads(&self) -> usize {
            self.reads.lock().unwrap().values().sum()
        }

        fn reads_of(&self, id: &str) -> usize {
            *self.reads.lock().unwrap().get(id).unwrap_or(&0)
        }
    }

    impl PartitionReader for MockReader {
        fn read(&self, id: &str) -> Result<Table> {
            *self
                .reads
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_insert(0) += 1;
            if self.fail.as_deref() == Some(id) {
                return Err(DatasetError::source(
                    id,
                    std::io::Error::other("simulated source failure"),
                ));
            }
            self.tables
                .get(id)
                .cloned()
                .ok_or_else(|| DatasetError::config(format!("unknown partition '{id}'")))
        }
    }

    /// Partitions p0..pN with the given row counts, rows numbered globally.
    fn dataset(counts: &[usize]) -> (Vec<String>, Arc<MockReader>) {
        let mut tables = HashMap::new();
        let mut start = 0;
        let partitions: Vec<String> = counts
            .iter()
            .enumerate()
            .map(|(i, &rows)| {
                let id = format!("p{i}");
                tables.insert(id.clone(), seq_table(start, rows));
                start += rows;
                id
            })
            .collect();
        (
            partitions,
            Arc::new(MockReader {
                tables,
                reads: Mutex::new(HashMap::new()),
                fail: None,
            }),
        )
    }

    fn spec(batch_size: usize) -> DatasetSpec {
        DatasetSpec {
            batch_size: Some(batch_size),
            ..DatasetSpec::new("unused")
        }
    }

    fn build(
        partitions: Vec<String>,
        reader: Arc<MockReader>,
        spec: &DatasetSpec,
    ) -> Result<BatchIterator> {
        BatchIterator::with_reader(partitions, reader, Arc::new(NumericConverter), spec)
    }

    #[test]
    fn exact_division_yields_one_partition_per_batch() {
        let (partitions, reader) = dataset(&[10, 10, 10, 10]);
        let spec = DatasetSpec {
            eager_load: true,
            iterations: Some(4),
            ..spec(10)
        };
        let mut iter = build(partitions, reader, &spec).unwrap();
        assert_eq!(iter.total_rows(), Some(40));

        for k in 0..4 {
            let batch = iter.next_batch().unwrap().expect("batch within budget");
            assert_eq!(batch.num_rows(), 10);
            let expected: Vec<f64> = (k * 10..(k + 1) * 10).map(|v| v as f64).collect();
            assert_eq!(batch.data(), &expected[..]);
        }
        assert!(iter.is_exhausted());
        assert!(iter.next_batch().unwrap().is_none());
    }

    #[test]
    fn cross_partition_batch_spans_and_wraps() {
        let (partitions, reader) = dataset(&[7, 7]);
        let spec = DatasetSpec {
            iterations: Some(2),
            ..spec(10)
        };
        let mut iter = build(partitions, reader, &spec).unwrap();

        let first = iter.next_batch().unwrap().unwrap();
        let expected: Vec<f64> = (0..10).map(|v| v as f64).collect();
        assert_eq!(first.data(), &expected[..]);

        // [10, 14) then wrapping to [0, 6), delivered as one batch of 10.
        let second = iter.next_batch().unwrap().unwrap();
        let mut expected: Vec<f64> = (10..14).map(|v| v as f64).collect();
        expected.extend((0..6).map(|v| v as f64));
        assert_eq!(second.data(), &expected[..]);

        assert!(iter.next_batch().unwrap().is_none());
    }

    #[test]
    fn lazy_extension_consults_only_needed_partitions() {
        let (partitions, reader) = dataset(&[3, 3, 3, 3]);
        let mut iter = build(partitions, Arc::clone(&reader), &spec(5)).unwrap();

        iter.next_batch().unwrap().unwrap();
        // Frontier 6 > 5 after two partitions; the rest stay untouched.
        assert_eq!(iter.materialized_partitions(), 2);
        assert_eq!(reader.total_reads(), 2);

        // The boundary index never has more entries than partitions read.
        iter.next_batch().unwrap().unwrap();
        assert_eq!(iter.materialized_partitions(), reader.total_reads());
    }

    #[test]
    fn wraparound_is_cyclic_continuation() {
        // T = 20, B = 8: the third batch wraps, the fourth resumes at
        // (3 * 8) mod 20 = 4.
        let (partitions, reader) = dataset(&[10, 10]);
        let mut iter = build(partitions, reader, &spec(8)).unwrap();

        let starts: Vec<f64> = (0..4)
            .map(|_| iter.next_batch().unwrap().unwrap().data()[0])
            .collect();
        assert_eq!(starts, vec![0.0, 8.0, 16.0, 4.0]);

        let (partitions, reader) = dataset(&[10, 10]);
        let mut third = build(partitions, reader, &spec(8)).unwrap();
        third.next_batch().unwrap().unwrap();
        third.next_batch().unwrap().unwrap();
        let wrapped = third.next_batch().unwrap().unwrap();
        let mut expected: Vec<f64> = (16..20).map(|v| v as f64).collect();
        expected.extend((0..4).map(|v| v as f64));
        assert_eq!(wrapped.data(), &expected[..]);
    }

    #[test]
    fn eager_batch_size_defaults_to_dataset_size() {
        let (partitions, reader) = dataset(&[6, 4]);
        let spec = DatasetSpec {
            eager_load: true,
            iterations: Some(1),
            ..DatasetSpec::new("unused")
        };
        let mut iter = build(partitions, reader, &spec).unwrap();
        assert_eq!(iter.batch_size(), 10);

        let batch = iter.next_batch().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 10);
        assert!(iter.next_batch().unwrap().is_none());
    }

    #[test]
    fn oversized_batch_is_a_config_error() {
        // Eager: detected at construction.
        let (partitions, reader) = dataset(&[5, 5]);
        let eager = DatasetSpec {
            eager_load: true,
            ..spec(20)
        };
        assert!(build(partitions, reader, &eager).unwrap_err().is_config());

        // Lazy: detected the moment full materialization reveals the total.
        let (partitions, reader) = dataset(&[5, 5]);
        let mut iter = build(partitions, reader, &spec(20)).unwrap();
        assert!(iter.next_batch().unwrap_err().is_config());
        assert!(iter.is_exhausted());
    }

    #[test]
    fn source_error_leaves_state_unchanged() {
        let (partitions, reader) = dataset(&[10, 10]);
        let reader = Arc::new(MockReader {
            tables: reader.tables.clone(),
            reads: Mutex::new(HashMap::new()),
            fail: Some("p1".to_string()),
        });
        let mut iter = build(partitions, Arc::clone(&reader), &spec(12)).unwrap();

        // [0, 12) needs p1, whose read fails.
        assert!(matches!(
            iter.next_batch().unwrap_err(),
            DatasetError::Source { .. }
        ));
        assert!(!iter.is_exhausted());
        assert_eq!(iter.materialized_partitions(), 1);

        // The cursor did not advance: the same step re-runs and fails again.
        assert!(matches!(
            iter.next_batch().unwrap_err(),
            DatasetError::Source { .. }
        ));
    }

    #[test]
    fn empty_partition_list_is_rejected() {
        let (_, reader) = dataset(&[1]);
        assert!(build(Vec::new(), reader, &spec(1)).unwrap_err().is_config());
    }

    #[test]
    fn partition_reads_happen_once_across_batches() {
        let (partitions, reader) = dataset(&[4]);
        let mut iter = build(partitions, Arc::clone(&reader), &spec(2)).unwrap();

        for _ in 0..5 {
            iter.next_batch().unwrap().unwrap();
        }
        assert_eq!(reader.reads_of("p0"), 1);
    }

    #[test]
    fn sharded_worker_iterates_its_chunk_only() {
        let (partitions, reader) = dataset(&[5, 5, 5, 5]);
        let mine = crate::shard::assign(partitions, 1, 2).unwrap();
        assert_eq!(mine, vec!["p2", "p3"]);

        let spec = DatasetSpec {
            eager_load: true,
            iterations: Some(1),
            ..spec(10)
        };
        let mut iter = build(mine, Arc::clone(&reader), &spec).unwrap();
        let batch = iter.next_batch().unwrap().unwrap();
        // This worker's rows are the global rows 10..20.
        let expected: Vec<f64> = (10..20).map(|v| v as f64).collect();
        assert_eq!(batch.data(), &expected[..]);
        assert_eq!(reader.reads_of("p0"), 0);
        assert_eq!(reader.reads_of("p1"), 0);
    }
}
