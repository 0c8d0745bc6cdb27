use crate::Result;
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// A Table represents one immutable chunk of tabular data: either a single
/// partition as read from its source, or the concatenation of several
/// partitions assembled to cover one batch request.
///
/// Wraps a single Arrow [`RecordBatch`]; row order is the source order.
#[derive(Clone, Debug)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a table from the record batches of one partition, concatenating
    /// them into a single contiguous batch. An empty slice produces an empty
    /// table with the given schema.
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        if batches.is_empty() {
            return Ok(Self::new(RecordBatch::new_empty(schema)));
        }
        let batch = concat_batches(&schema, batches)?;
        Ok(Self::new(batch))
    }

    /// Concatenate several tables in order, preserving each table's internal
    /// row order. The schema is taken from the first table.
    pub fn concat(tables: &[Arc<Table>]) -> Result<Self> {
        let schema = tables
            .first()
            .map(|t| t.schema())
            .ok_or_else(|| crate::DatasetError::invariant("concat of zero tables"))?;
        let batches: Vec<RecordBatch> = tables.iter().map(|t| t.batch.clone()).collect();
        let batch = concat_batches(&schema, &batches)?;
        Ok(Self::new(batch))
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Zero-copy row slice `[offset, offset + length)`.
    pub fn slice(&self, offset: usize, length: usize) -> Table {
        Self::new(self.batch.slice(offset, length))
    }
}
