use crate::{Result, Table};
use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;

/// The final consumer-facing form of a batch: every numeric column cast to
/// f64 and laid out row-major. Non-numeric columns are dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorBatch {
    columns: Vec<String>,
    num_rows: usize,
    data: Vec<f64>,
}

impl TensorBatch {
    pub fn new(columns: Vec<String>, num_rows: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), num_rows * columns.len());
        Self {
            columns,
            num_rows,
            data,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One row as a contiguous slice of column values.
    pub fn row(&self, idx: usize) -> &[f64] {
        let width = self.columns.len();
        &self.data[idx * width..(idx + 1) * width]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Conversion of a row-sliced table into the delivery form.
///
/// Treated as a pure function for caching purposes: converting the same
/// table twice must yield value-equal batches.
pub trait BatchConverter: Send + Sync {
    fn convert(&self, table: &Table) -> Result<TensorBatch>;
}

/// Default converter: selects the numeric columns, casts each to `Float64`
/// and emits a row-major [`TensorBatch`]. Nulls become NaN.
#[derive(Debug, Default, Clone)]
pub struct NumericConverter;

impl BatchConverter for NumericConverter {
    fn convert(&self, table: &Table) -> Result<TensorBatch> {
        let batch = table.batch();
        let schema = table.schema();

        let mut names = Vec::new();
        let mut casted: Vec<Float64Array> = Vec::new();
        for (idx, field) in schema.fields().iter().enumerate() {
            if !field.data_type().is_numeric() {
                continue;
            }
            let array = cast(batch.column(idx), &DataType::Float64)?;
            let array = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    crate::DatasetError::invariant(format!(
                        "cast of column '{}' did not produce Float64",
                        field.name()
                    ))
                })?
                .clone();
            names.push(field.name().clone());
            casted.push(array);
        }

        let num_rows = batch.num_rows();
        let mut data = Vec::with_capacity(num_rows * casted.len());
        for row in 0..num_rows {
            for col in &casted {
                data.push(if col.is_null(row) {
                    f64::NAN
                } else {
                    col.value(row)
                });
            }
        }

        Ok(TensorBatch::new(names, num_rows, data))
    }
}
