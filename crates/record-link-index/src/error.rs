//! Error types for index operations.

use thiserror::Error;

/// Failures raised while building or querying the similarity index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector of the wrong dimension was handed to the vector index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector index cannot hold more records.
    #[error("vector index is full: capacity {capacity}")]
    CapacityExceeded { capacity: usize },

    /// Index construction failed.
    #[error("index construction failed: {message}")]
    ConstructionFailed { message: String },
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
