//! Error types for embedding operations.

use thiserror::Error;

/// Failures raised by embedding providers and their plumbing.
///
/// All of these are local-recoverable at the batch level: the batch embedder
/// converts them into zero vectors and keeps going.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider backend reported a failure.
    #[error("provider '{provider}' failed: {message}")]
    ProviderFailure { provider: String, message: String },

    /// A provider call exceeded its configured timeout.
    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// Every provider in a fallback chain failed.
    #[error("all {count} providers in the chain failed; last: {last}")]
    ChainExhausted { count: usize, last: String },

    /// Chain construction with inconsistent dimensions or no providers.
    #[error("invalid provider chain: {message}")]
    InvalidChain { message: String },

    /// A provider returned a vector of the wrong dimension.
    #[error("provider '{provider}' returned dimension {actual}, expected {expected}")]
    DimensionMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },
}

/// Result alias for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
