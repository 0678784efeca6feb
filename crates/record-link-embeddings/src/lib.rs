//! Embedding support for the record-link engine.
//!
//! The core consumes embeddings, it does not train them. This crate provides:
//!
//! - [`EmbeddingProvider`]: async trait implemented by model backends
//! - [`HashEmbeddingProvider`]: deterministic trigram-hash provider, used as
//!   the cheap fallback and as the test double
//! - [`ProviderChain`]: ordered fallback across providers
//! - [`EmbeddingCache`]: bounded cache keyed by xxhash64 of normalized text
//! - [`BatchEmbedder`]: batched, cached, timeout-guarded embedding of record
//!   fields with zero-vector degradation on failure
//!
//! Provider failure is never batch-fatal: a failed or timed-out call
//! degrades to a zero vector, is logged at `warn` level and counted.

pub mod batch;
pub mod cache;
pub mod error;
pub mod provider;

pub use batch::{BatchEmbedder, EmbeddedBatch};
pub use cache::{CacheKey, CacheStats, EmbeddingCache};
pub use error::{EmbeddingError, EmbeddingResult};
pub use provider::{zero_vector, EmbeddingProvider, HashEmbeddingProvider, ProviderChain};
