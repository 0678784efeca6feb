//! Error types for record-link-core.
//!
//! Configuration violations are rejected eagerly at construction time and
//! surface as [`CoreError`] variants; they are never deferred to match time.

use thiserror::Error;

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A match rule failed construction-time validation.
    #[error("invalid rule '{rule_id}': {message}")]
    InvalidRule { rule_id: String, message: String },

    /// A weight set that must sum to 1.0 does not.
    #[error("{context}: weights sum to {sum}, expected 1.0 (±{epsilon})")]
    WeightSum {
        context: String,
        sum: f64,
        epsilon: f64,
    },

    /// General configuration violation.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A per-field validator pattern failed to compile.
    #[error("invalid validator pattern for field '{field}': {source}")]
    InvalidValidator {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A field is mapped to the CUSTOM survivorship strategy but no
    /// resolver function was supplied for it.
    #[error("field '{field}' uses the custom survivorship strategy but no resolver was registered")]
    MissingCustomResolver { field: String },

    /// Survivorship was asked to merge an empty cluster.
    #[error("cannot merge an empty cluster into a golden record")]
    EmptyCluster,
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
