//! Batched, cached embedding of record fields.
//!
//! Embedding happens once per batch, at index-build time, so the matching
//! phase only reads precomputed vectors. Calls are batched for throughput,
//! guarded by a per-call timeout, and cached by normalized text. A failed or
//! timed-out call degrades those texts to zero vectors, bumps the failure
//! counter and logs a warning; it never aborts the batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use record_link_core::config::EmbeddingConfig;
use record_link_core::types::{is_missing_text, Record, RecordId};

use crate::cache::{CacheKey, EmbeddingCache};
use crate::provider::{zero_vector, EmbeddingProvider};

/// Per-field vectors for every record of a batch.
pub struct EmbeddedBatch {
    pub dimension: usize,
    vectors: HashMap<RecordId, HashMap<String, Arc<Vec<f32>>>>,
    /// Provider calls that degraded to zero vectors.
    pub failures: u64,
}

impl EmbeddedBatch {
    pub fn get(&self, id: &RecordId, field: &str) -> Option<&Arc<Vec<f32>>> {
        self.vectors.get(id).and_then(|m| m.get(field))
    }

    pub fn fields_of(&self, id: &RecordId) -> Option<&HashMap<String, Arc<Vec<f32>>>> {
        self.vectors.get(id)
    }
}

/// Normalization applied before hashing and embedding: lowercase,
/// whitespace-collapsed. Cache keys and provider inputs always agree.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Batches embedding calls over records' configured fields.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    config: EmbeddingConfig,
    failures: AtomicU64,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        let cache = EmbeddingCache::new(config.cache_capacity);
        Self {
            provider,
            cache,
            config,
            failures: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Embed one text, consulting the cache. Missing/sentinel text yields a
    /// zero vector without touching the provider.
    pub async fn embed_text(&self, text: &str) -> Arc<Vec<f32>> {
        let dim = self.provider.dimension();
        let normalized = normalize_text(text);
        if is_missing_text(&normalized) {
            return Arc::new(zero_vector(dim));
        }
        let key = CacheKey::from_text(&normalized);
        if let Some(v) = self.cache.get(key) {
            return v;
        }
        let fut = self.provider.embed(&normalized);
        let result = timeout(Duration::from_millis(self.config.call_timeout_ms), fut).await;
        match result {
            Ok(Ok(v)) if v.len() == dim => {
                let v = Arc::new(v);
                self.cache.insert(key, v.clone());
                v
            }
            Ok(Ok(v)) => {
                warn!(
                    provider = self.provider.model_name(),
                    expected = dim,
                    actual = v.len(),
                    "embedding dimension mismatch, substituting zero vector"
                );
                self.failures.fetch_add(1, Ordering::Relaxed);
                Arc::new(zero_vector(dim))
            }
            Ok(Err(e)) => {
                warn!(
                    provider = self.provider.model_name(),
                    error = %e,
                    "embedding failed, substituting zero vector"
                );
                self.failures.fetch_add(1, Ordering::Relaxed);
                Arc::new(zero_vector(dim))
            }
            Err(_) => {
                warn!(
                    provider = self.provider.model_name(),
                    timeout_ms = self.config.call_timeout_ms,
                    "embedding timed out, substituting zero vector"
                );
                self.failures.fetch_add(1, Ordering::Relaxed);
                Arc::new(zero_vector(dim))
            }
        }
    }

    /// Embed the given fields of every record.
    ///
    /// Unique normalized texts are deduplicated, looked up in the cache, and
    /// the remainder embedded in provider batches of `config.batch_size`.
    pub async fn embed_fields(&self, records: &[Record], fields: &[String]) -> EmbeddedBatch {
        let dim = self.provider.dimension();
        let zero = Arc::new(zero_vector(dim));

        // Unique texts that actually need the provider.
        let mut pending: Vec<String> = Vec::new();
        let mut seen: HashMap<CacheKey, ()> = HashMap::new();
        for record in records {
            for field in fields {
                if let Some(value) = record.present(field) {
                    let text = normalize_text(&value.as_text());
                    if is_missing_text(&text) {
                        continue;
                    }
                    let key = CacheKey::from_text(&text);
                    if seen.contains_key(&key) || self.cache.get(key).is_some() {
                        continue;
                    }
                    seen.insert(key, ());
                    pending.push(text);
                }
            }
        }

        // Failed texts get zero vectors locally, without poisoning the cache.
        let mut degraded: HashMap<CacheKey, Arc<Vec<f32>>> = HashMap::new();
        for chunk in pending.chunks(self.config.batch_size.max(1)) {
            let texts: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let fut = self.provider.embed_batch(&texts);
            let result = timeout(Duration::from_millis(self.config.call_timeout_ms), fut).await;
            match result {
                Ok(Ok(vectors)) if vectors.len() == chunk.len() => {
                    for (text, v) in chunk.iter().zip(vectors) {
                        let key = CacheKey::from_text(text);
                        if v.len() == dim {
                            self.cache.insert(key, Arc::new(v));
                        } else {
                            self.failures.fetch_add(1, Ordering::Relaxed);
                            degraded.insert(key, zero.clone());
                        }
                    }
                }
                Ok(Ok(vectors)) => {
                    warn!(
                        expected = chunk.len(),
                        actual = vectors.len(),
                        "provider returned wrong batch size, degrading chunk"
                    );
                    self.failures
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    for text in chunk {
                        degraded.insert(CacheKey::from_text(text), zero.clone());
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, size = chunk.len(), "embedding batch failed, degrading chunk");
                    self.failures
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    for text in chunk {
                        degraded.insert(CacheKey::from_text(text), zero.clone());
                    }
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.call_timeout_ms,
                        size = chunk.len(),
                        "embedding batch timed out, degrading chunk"
                    );
                    self.failures
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    for text in chunk {
                        degraded.insert(CacheKey::from_text(text), zero.clone());
                    }
                }
            }
        }

        // Assemble per-record vectors.
        let mut vectors: HashMap<RecordId, HashMap<String, Arc<Vec<f32>>>> =
            HashMap::with_capacity(records.len());
        for record in records {
            let mut per_field = HashMap::with_capacity(fields.len());
            for field in fields {
                let v = match record.present(field) {
                    Some(value) => {
                        let text = normalize_text(&value.as_text());
                        if is_missing_text(&text) {
                            zero.clone()
                        } else {
                            let key = CacheKey::from_text(&text);
                            self.cache
                                .get(key)
                                .or_else(|| degraded.get(&key).cloned())
                                .unwrap_or_else(|| zero.clone())
                        }
                    }
                    None => zero.clone(),
                };
                per_field.insert(field.clone(), v);
            }
            vectors.insert(record.id.clone(), per_field);
        }

        debug!(
            records = records.len(),
            fields = fields.len(),
            embedded = pending.len(),
            failures = self.failures(),
            "embedded batch fields"
        );

        EmbeddedBatch {
            dimension: dim,
            vectors,
            failures: self.failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashEmbeddingProvider;
    use async_trait::async_trait;
    use record_link_core::config::EmbeddingConfig;

    struct FlakyProvider;

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> crate::error::EmbeddingResult<Vec<f32>> {
            Err(crate::error::EmbeddingError::ProviderFailure {
                provider: "flaky".to_string(),
                message: "down".to_string(),
            })
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn embedder() -> BatchEmbedder {
        BatchEmbedder::new(
            Arc::new(HashEmbeddingProvider::new(16)),
            EmbeddingConfig::default(),
        )
    }

    #[tokio::test]
    async fn sentinel_text_yields_zero_vector() {
        let e = embedder();
        for text in ["", "  ", "null", "N/A"] {
            let v = e.embed_text(text).await;
            assert!(v.iter().all(|x| *x == 0.0), "{text:?}");
        }
        assert_eq!(e.failures(), 0);
    }

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let e = embedder();
        let a = e.embed_text("John Doe").await;
        let b = e.embed_text("john   doe").await; // normalizes identically
        assert_eq!(a, b);
        assert!(e.cache().stats().hits() >= 1);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_zero() {
        let e = BatchEmbedder::new(Arc::new(FlakyProvider), EmbeddingConfig::default());
        let v = e.embed_text("hello").await;
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(e.failures(), 1);
    }

    #[tokio::test]
    async fn embed_fields_covers_every_record() {
        let e = embedder();
        let records = vec![
            Record::new("r1", "crm").with_field("name", "Ada Lovelace"),
            Record::new("r2", "erp").with_field("name", "A. Lovelace"),
            Record::new("r3", "web"), // no name at all
        ];
        let batch = e.embed_fields(&records, &["name".to_string()]).await;
        for r in &records {
            let v = batch.get(&r.id, "name").unwrap();
            assert_eq!(v.len(), 16);
        }
        // Missing field embeds to zero.
        let v3 = batch.get(&RecordId::from("r3"), "name").unwrap();
        assert!(v3.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn failed_batch_degrades_all_texts() {
        let e = BatchEmbedder::new(Arc::new(FlakyProvider), EmbeddingConfig::default());
        let records = vec![Record::new("r1", "crm").with_field("name", "Ada")];
        let batch = e.embed_fields(&records, &["name".to_string()]).await;
        let v = batch.get(&RecordId::from("r1"), "name").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert!(batch.failures >= 1);
    }
}
