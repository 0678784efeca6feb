//! Error types for batch resolution.

use thiserror::Error;

/// Failures raised by the batch pipeline.
///
/// Per the error taxonomy, only [`EngineError::ResourceExhausted`] aborts an
/// in-flight batch; configuration errors are raised before any record is
/// touched, and pair-local failures degrade to ERROR match results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected at construction time.
    #[error(transparent)]
    Config(#[from] record_link_core::CoreError),

    /// Index construction or query failure.
    #[error(transparent)]
    Index(#[from] record_link_index::IndexError),

    /// Sustained memory pressure after an attempted reclaim. The caller
    /// must retry with a smaller batch or apply backpressure upstream.
    #[error("resource exhaustion: memory pressure stayed critical after reclaim at {pairs_compared} pairs")]
    ResourceExhausted { pairs_compared: u64 },
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
