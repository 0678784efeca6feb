//! Embedding provider trait, deterministic hash provider, fallback chain.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::error::{EmbeddingError, EmbeddingResult};

/// Trait for embedding providers.
///
/// Implementations convert text to dense vector representations and must be
/// deterministic for identical input (modulo model version).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// Default implementation calls `embed` per text; backends with real
    /// batch endpoints should override.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Output dimension of embeddings.
    fn dimension(&self) -> usize;

    /// Model name/identifier.
    fn model_name(&self) -> &str;
}

/// The degraded embedding: what missing text and failed calls map to.
pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}

// ============================================================================
// DETERMINISTIC HASH PROVIDER
// ============================================================================

/// Deterministic character-trigram hashing provider.
///
/// Each trigram of the input is hashed into one of `dimension` buckets and
/// the resulting count vector is L2-normalized. No model weights, no I/O:
/// identical text always yields the identical vector, and similar strings
/// share trigrams and therefore direction. Used as the cheap fallback when a
/// primary model provider cannot initialize, and as the test double.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        let mut v = vec![0.0f32; self.dimension];
        if chars.len() < 3 {
            // Short inputs hash as a whole.
            if !chars.is_empty() {
                let s: String = chars.iter().collect();
                let bucket = (xxh64(s.as_bytes(), 0) as usize) % self.dimension;
                v[bucket] = 1.0;
            }
            return v;
        }
        for w in chars.windows(3) {
            let gram: String = w.iter().collect();
            let bucket = (xxh64(gram.as_bytes(), 0) as usize) % self.dimension;
            v[bucket] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "trigram-hash"
    }
}

// ============================================================================
// PROVIDER CHAIN
// ============================================================================

/// Ordered provider fallback.
///
/// Tries providers in order and returns the first success; each failure is
/// logged at `warn` level. If every provider fails the error propagates and
/// the batch embedder degrades that text to a zero vector.
pub struct ProviderChain {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ProviderChain {
    /// All providers must agree on dimension; an empty chain is invalid.
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> EmbeddingResult<Self> {
        let first = providers.first().ok_or_else(|| EmbeddingError::InvalidChain {
            message: "chain has no providers".to_string(),
        })?;
        let dim = first.dimension();
        for p in &providers[1..] {
            if p.dimension() != dim {
                return Err(EmbeddingError::InvalidChain {
                    message: format!(
                        "provider '{}' has dimension {}, chain expects {}",
                        p.model_name(),
                        p.dimension(),
                        dim
                    ),
                });
            }
        }
        info!(
            primary = first.model_name(),
            fallbacks = providers.len() - 1,
            "embedding provider chain ready"
        );
        Ok(Self { providers })
    }

    /// Primary provider with the deterministic hash provider as fallback.
    pub fn with_hash_fallback(primary: Arc<dyn EmbeddingProvider>) -> EmbeddingResult<Self> {
        let dim = primary.dimension();
        Self::new(vec![primary, Arc::new(HashEmbeddingProvider::new(dim))])
    }
}

#[async_trait]
impl EmbeddingProvider for ProviderChain {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut last = String::new();
        for p in &self.providers {
            match p.embed(text).await {
                Ok(v) if v.len() == self.dimension() => return Ok(v),
                Ok(v) => {
                    warn!(
                        provider = p.model_name(),
                        expected = self.dimension(),
                        actual = v.len(),
                        "provider returned wrong dimension, falling back"
                    );
                    last = format!("dimension mismatch from '{}'", p.model_name());
                }
                Err(e) => {
                    warn!(provider = p.model_name(), error = %e, "provider failed, falling back");
                    last = e.to_string();
                }
            }
        }
        Err(EmbeddingError::ChainExhausted {
            count: self.providers.len(),
            last,
        })
    }

    fn dimension(&self) -> usize {
        self.providers[0].dimension()
    }

    fn model_name(&self) -> &str {
        self.providers[0].model_name()
    }
}
