use rowstream_sdk::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// On-disk format of the partitions matched by the glob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionFormat {
    Csv,
    Parquet,
}

/// Dataset configuration, loadable from YAML.
///
/// Everything but `glob` has a default. Validation is eager: a spec is
/// checked in full when the iterator is opened, before any partition is
/// touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Pattern matching the dataset's partitions; must match at least one.
    pub glob: String,

    /// Partition format; inferred from the glob's extension when omitted.
    #[serde(default)]
    pub format: Option<PartitionFormat>,

    /// Per-column type hints applied during CSV schema inference, e.g.
    /// `{"col_a": "float64", "col_b": "int32"}`. Ignored for Parquet.
    #[serde(default)]
    pub dtypes: HashMap<String, String>,

    /// Rows per delivered batch. Required unless eager loading is on, in
    /// which case it defaults to the full dataset size.
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Number of batches to produce; omitted means unbounded.
    #[serde(default)]
    pub iterations: Option<u64>,

    /// Materialize the full boundary index (and partition cache) up front.
    #[serde(default)]
    pub eager_load: bool,

    /// This worker's index in `[0, replicas)`.
    #[serde(default)]
    pub worker: usize,

    /// Total number of workers sharing the partition list.
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Partition cache capacity; omitted means unbounded.
    #[serde(default)]
    pub partition_cache: Option<usize>,

    /// Batch-assembly cache capacity.
    #[serde(default = "default_unit_cache")]
    pub batch_cache: usize,

    /// Materialized-range (tensor) cache capacity.
    #[serde(default = "default_unit_cache")]
    pub tensor_cache: usize,
}

fn default_replicas() -> usize {
    1
}

fn default_unit_cache() -> usize {
    1
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            glob: String::new(),
            format: None,
            dtypes: HashMap::new(),
            batch_size: None,
            iterations: None,
            eager_load: false,
            worker: 0,
            replicas: default_replicas(),
            partition_cache: None,
            batch_cache: default_unit_cache(),
            tensor_cache: default_unit_cache(),
        }
    }
}

impl DatasetSpec {
    pub fn new(glob: impl Into<String>) -> Self {
        Self {
            glob: glob.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(DatasetError::config(
                "the batch size must be a positive integer",
            ));
        }
        if self.batch_size.is_none() && !self.eager_load {
            return Err(DatasetError::config(
                "eager loading is disabled, so the batch size must be specified",
            ));
        }
        if self.iterations == Some(0) {
            return Err(DatasetError::config(
                "the iteration count must be a positive integer, or omitted for unbounded",
            ));
        }
        if self.replicas == 0 {
            return Err(DatasetError::config(
                "the number of replicas must be a positive integer",
            ));
        }
        if self.worker >= self.replicas {
            return Err(DatasetError::config(format!(
                "worker {} out of range [0, {})",
                self.worker, self.replicas
            )));
        }
        if self.partition_cache == Some(0) || self.batch_cache == 0 || self.tensor_cache == 0 {
            return Err(DatasetError::config(
                "cache capacities must be positive (omit the partition cache for unbounded)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_roundtrip_with_defaults() {
        let spec: DatasetSpec = serde_yaml::from_str(
            r#"
glob: "data/train-*.csv"
batch_size: 128
iterations: 20
dtypes:
  label: int64
"#,
        )
        .unwrap();

        assert_eq!(spec.glob, "data/train-*.csv");
        assert_eq!(spec.batch_size, Some(128));
        assert_eq!(spec.iterations, Some(20));
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.batch_cache, 1);
        assert_eq!(spec.partition_cache, None);
        assert_eq!(spec.dtypes.get("label").map(String::as_str), Some("int64"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn missing_batch_size_requires_eager_load() {
        let mut spec = DatasetSpec::new("data/*.csv");
        assert!(spec.validate().unwrap_err().is_config());
        spec.eager_load = true;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn invalid_knobs_are_rejected() {
        let base = DatasetSpec {
            batch_size: Some(10),
            ..DatasetSpec::new("data/*.csv")
        };

        for spec in [
            DatasetSpec {
                batch_size: Some(0),
                ..base.clone()
            },
            DatasetSpec {
                iterations: Some(0),
                ..base.clone()
            },
            DatasetSpec {
                replicas: 0,
                ..base.clone()
            },
            DatasetSpec {
                worker: 2,
                replicas: 2,
                ..base.clone()
            },
            DatasetSpec {
                partition_cache: Some(0),
                ..base.clone()
            },
            DatasetSpec {
                tensor_cache: 0,
                ..base.clone()
            },
        ] {
            assert!(spec.validate().unwrap_err().is_config());
        }
    }
}
