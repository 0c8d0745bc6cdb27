use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use arrow::record_batch::RecordBatch;
use rowstream_sdk::{DatasetError, PartitionReader, Result, Table};
use std::fs::File;

/// Reads one Parquet partition into a [`Table`], concatenating the file's
/// record batches into a single contiguous batch. The schema is taken from
/// the file itself; dtype hints do not apply.
#[derive(Debug, Default)]
pub struct ParquetPartitionReader;

impl ParquetPartitionReader {
    pub fn new() -> Self {
        Self
    }
}

impl PartitionReader for ParquetPartitionReader {
    fn read(&self, id: &str) -> Result<Table> {
        let file = File::open(id).map_err(|e| DatasetError::source(id, e))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| DatasetError::source(id, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| DatasetError::source(id, e))?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DatasetError::source(id, e))?;
        Table::from_batches(schema, &batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::parquet::arrow::ArrowWriter;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn write_parquet(values: &[i64]) -> tempfile::NamedTempFile {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int64Array::from(values.to_vec()))],
        )
        .unwrap();

        let file = tempfile::Builder::new()
            .suffix(".parquet")
            .tempfile()
            .unwrap();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    #[test]
    fn reads_rows_back() {
        let file = write_parquet(&[5, 6, 7]);
        let table = ParquetPartitionReader::new()
            .read(file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(table.num_rows(), 3);
        let col = table
            .batch()
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(col.value(2), 7);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let err = ParquetPartitionReader::new()
            .read("/no/such/partition.parquet")
            .unwrap_err();
        assert!(matches!(err, DatasetError::Source { .. }));
    }
}
