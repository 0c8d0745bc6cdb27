//! Batch-index materialization and bounded-cache pipeline.
//!
//! Streams a logically unbounded sequence of fixed-size row batches out of a
//! collection of variably-sized tabular partitions, discovering partition
//! row counts lazily and keeping three layered caches so that repeated or
//! overlapping batch requests avoid redundant source reads.

pub mod boundary;
pub mod cache;
pub mod io;
pub mod iterator;
pub mod range;
pub mod shard;
pub mod spec;

pub use boundary::BoundaryIndex;
pub use cache::{AssembledBatch, CacheConfig, CacheHierarchy};
pub use iterator::{BatchIterator, Cursor};
pub use range::RowRange;
pub use spec::{DatasetSpec, PartitionFormat};
