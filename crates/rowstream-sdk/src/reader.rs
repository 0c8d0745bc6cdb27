use crate::{Result, Table};

/// Unified reader trait for partition sources.
///
/// A partition identifier is an opaque string (typically a file path or
/// object key). Implementations must be deterministic for a fixed identifier
/// within one run: the caches built on top of this trait assume that reading
/// the same partition twice yields value-equal tables. Retries, timeouts and
/// credentials all live behind this boundary, not in the core.
pub trait PartitionReader: Send + Sync {
    /// Read one partition in full and return its tabular contents.
    fn read(&self, id: &str) -> Result<Table>;
}
