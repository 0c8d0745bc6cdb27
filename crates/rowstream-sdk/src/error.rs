use thiserror::Error;

/// Unified error type for the rowstream crates.
///
/// Three categories matter to callers:
/// - [`DatasetError::Config`] is raised synchronously at construction and is
///   always a caller mistake (empty glob match, zero batch size, ...).
/// - [`DatasetError::Source`] is a per-step failure of a partition read; the
///   iterator state is left untouched so the run can be abandoned cleanly.
/// - [`DatasetError::Invariant`] indicates a bug in the core itself.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("failed to read partition '{partition}': {source}")]
    Source {
        partition: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invariant violation: {message}")]
    Invariant { message: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

// Convenience constructors
impl DatasetError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn source(
        partition: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Source {
            partition: partition.into(),
            source: source.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// True for errors raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
