use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rowstream_sdk::{DatasetError, PartitionReader, Result, Table};
use std::collections::HashMap;
use std::fs::File;
use std::io::Seek;
use std::sync::Arc;

/// Reads one CSV partition (with header row) into a [`Table`].
///
/// The schema is inferred per file, then per-column dtype hints override the
/// inferred types. Hints for columns a file does not have are ignored, the
/// way the original per-column dtype map behaves.
#[derive(Debug)]
pub struct CsvPartitionReader {
    dtypes: HashMap<String, DataType>,
}

impl CsvPartitionReader {
    pub fn new(hints: &HashMap<String, String>) -> Result<Self> {
        let mut dtypes = HashMap::with_capacity(hints.len());
        for (column, name) in hints {
            let dtype = parse_dtype(name).ok_or_else(|| {
                DatasetError::config(format!(
                    "unsupported dtype '{name}' for column '{column}'"
                ))
            })?;
            dtypes.insert(column.clone(), dtype);
        }
        Ok(Self { dtypes })
    }

    fn apply_hints(&self, inferred: Schema) -> Schema {
        if self.dtypes.is_empty() {
            return inferred;
        }
        let fields: Vec<Field> = inferred
            .fields()
            .iter()
            .map(|field| match self.dtypes.get(field.name()) {
                Some(dtype) => Field::new(field.name(), dtype.clone(), true),
                None => field.as_ref().clone(),
            })
            .collect();
        Schema::new(fields)
    }
}

fn parse_dtype(name: &str) -> Option<DataType> {
    let dtype = match name.to_ascii_lowercase().as_str() {
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" => DataType::UInt64,
        "float32" => DataType::Float32,
        "float64" => DataType::Float64,
        "utf8" | "string" => DataType::Utf8,
        "bool" | "boolean" => DataType::Boolean,
        _ => return None,
    };
    Some(dtype)
}

impl PartitionReader for CsvPartitionReader {
    fn read(&self, id: &str) -> Result<Table> {
        let mut file = File::open(id).map_err(|e| DatasetError::source(id, e))?;

        let format = Format::default().with_header(true);
        let (inferred, _) = format
            .infer_schema(&mut file, None)
            .map_err(|e| DatasetError::source(id, e))?;
        file.rewind().map_err(|e| DatasetError::source(id, e))?;

        let schema = Arc::new(self.apply_hints(inferred));
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(true)
            .build(file)
            .map_err(|e| DatasetError::source(id, e))?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DatasetError::source(id, e))?;
        Table::from_batches(schema, &batches)
    }
}
