pub mod convert;
pub mod error;
pub mod reader;
pub mod table;

pub use convert::{BatchConverter, NumericConverter, TensorBatch};
pub use error::{DatasetError, Result};
pub use reader::PartitionReader;
pub use table::Table;
