use rowstream_sdk::{DatasetError, Result};
use tracing::debug;

/// Cumulative row-count prefix sums over the ordered partition list.
///
/// Entry `i` is the number of rows contributed by all partitions with index
/// `< i`; the leading entry is always `0`. The sequence is append-only and
/// strictly increasing past the leading zero: a partition's count is read
/// exactly once and never rewritten. Until every partition has been
/// consulted the index is a frontier, advanced on demand.
#[derive(Debug, Clone)]
pub struct BoundaryIndex {
    boundaries: Vec<usize>,
}

impl Default for BoundaryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryIndex {
    pub fn new() -> Self {
        Self { boundaries: vec![0] }
    }

    /// The materialized prefix sums, starting with the mandatory `0`.
    pub fn entries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Number of partitions whose row counts are known.
    pub fn materialized_partitions(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_fully_materialized(&self, partition_count: usize) -> bool {
        self.materialized_partitions() == partition_count
    }

    /// Rows discovered so far; the dataset total once fully materialized.
    pub fn total_rows(&self) -> usize {
        *self
            .boundaries
            .last()
            .expect("boundary index always holds the leading zero")
    }

    /// Index of the partition whose `[boundary[i], boundary[i+1])` interval
    /// contains `global_row`: the largest `i` with `boundary[i] <= global_row`.
    /// Right-biased, so a row landing exactly on a boundary belongs to the
    /// partition that starts there.
    pub fn locate(&self, global_row: usize) -> usize {
        self.boundaries.partition_point(|&b| b <= global_row) - 1
    }

    /// Extend the frontier, reading partition row counts one at a time in
    /// partition order, until the frontier strictly exceeds `target` or every
    /// partition has been consumed. No-op when already satisfied.
    pub fn extend_until_covers<F>(
        &mut self,
        target: usize,
        partitions: &[String],
        mut fetch_rows: F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Result<usize>,
    {
        while !self.is_fully_materialized(partitions.len()) && self.total_rows() <= target {
            let next = self.materialized_partitions();
            let rows = fetch_rows(&partitions[next])?;
            self.push_partition(&partitions[next], rows)?;
        }
        Ok(())
    }

    /// Extend unconditionally until every partition's count is known.
    pub fn extend_in_full<F>(&mut self, partitions: &[String], mut fetch_rows: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<usize>,
    {
        while !self.is_fully_materialized(partitions.len()) {
            let next = self.materialized_partitions();
            let rows = fetch_rows(&partitions[next])?;
            self.push_partition(&partitions[next], rows)?;
        }
        Ok(())
    }

    fn push_partition(&mut self, id: &str, rows: usize) -> Result<()> {
        if rows == 0 {
            // A zero-row partition would break the strictly-increasing
            // invariant that locate() relies on.
            return Err(DatasetError::source(
                id,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "partition contains no rows",
                ),
            ));
        }
        let frontier = self.total_rows() + rows;
        debug!(partition = id, rows, frontier, "boundary index extended");
        self.boundaries.push(frontier);
        Ok(())
    }
}
