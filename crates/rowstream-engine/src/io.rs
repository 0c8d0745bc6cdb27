use crate::spec::{DatasetSpec, PartitionFormat};
use rowstream_sdk::{DatasetError, PartitionReader, Result};
use std::sync::Arc;

// Reader implementations
pub mod csv;
pub mod parquet;

pub use csv::CsvPartitionReader;
pub use parquet::ParquetPartitionReader;

/// Expand the glob pattern into the ordered partition list.
///
/// The match order is made deterministic by sorting; an empty match is a
/// configuration error, not an empty dataset.
pub fn discover_partitions(pattern: &str) -> Result<Vec<String>> {
    let paths = glob::glob(pattern)
        .map_err(|e| DatasetError::config(format!("invalid glob pattern '{pattern}': {e}")))?;

    let mut partitions = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| DatasetError::config(format!("glob walk failed: {e}")))?;
        partitions.push(path.to_string_lossy().into_owned());
    }
    partitions.sort();

    if partitions.is_empty() {
        return Err(DatasetError::config(format!(
            "glob pattern '{pattern}' matched no partitions"
        )));
    }
    Ok(partitions)
}

/// Factory for creating partition readers based on the dataset spec.
pub struct ReaderFactory;

impl ReaderFactory {
    /// Create a reader from the spec, inferring the format from the glob's
    /// extension when not set explicitly. CSV is the fallback.
    pub fn create(spec: &DatasetSpec) -> Result<Arc<dyn PartitionReader>> {
        let format = spec.format.unwrap_or_else(|| {
            if spec.glob.ends_with(".parquet") {
                PartitionFormat::Parquet
            } else {
                PartitionFormat::Csv
            }
        });

        Ok(match format {
            PartitionFormat::Parquet => Arc::new(ParquetPartitionReader::new()),
            PartitionFormat::Csv => Arc::new(CsvPartitionReader::new(&spec.dtypes)?),
        })
    }
}
