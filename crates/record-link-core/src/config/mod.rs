//! Engine configuration.
//!
//! Everything here is validated eagerly: a configuration that would fail at
//! match time is rejected at construction time instead (fail-fast class of
//! the error taxonomy). `EngineConfig::validate` is the single gate the
//! pipeline calls before touching any record.

mod rule;
mod survivorship;
mod trust;

pub use rule::{FieldSpec, MatchRule, WEIGHT_SUM_EPSILON};
pub use survivorship::{SurvivorshipConfig, SurvivorshipStrategy};
pub use trust::{ConsistencyRule, DimensionWeights, TrustConfig};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// ============================================================================
// BLOCKING
// ============================================================================

fn default_blocking_cache_capacity() -> u64 {
    10_000
}

/// Configuration for blocking-key generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Fields the coarse partition key is derived from, in order.
    pub fields: Vec<String>,
    /// Bounded capacity of the per-batch blocking-key cache.
    #[serde(default = "default_blocking_cache_capacity")]
    pub cache_capacity: u64,
}

impl BlockingConfig {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            cache_capacity: default_blocking_cache_capacity(),
        }
    }
}

// ============================================================================
// SIMILARITY INDEX
// ============================================================================

fn default_signature_seeds() -> usize {
    4
}

fn default_minhash_permutations() -> usize {
    8
}

fn default_top_k() -> usize {
    10
}

fn default_similarity_floor() -> f32 {
    0.70
}

fn default_dimension() -> usize {
    256
}

/// HNSW construction and search parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HnswParams {
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_elements: usize,
    pub max_layer: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
            max_elements: 100_000,
            max_layer: 16,
        }
    }
}

/// Configuration for the similarity index (signature buckets + vectors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Independent hash seeds per field for whole-value/token signatures.
    #[serde(default = "default_signature_seeds")]
    pub signature_seeds: usize,
    /// Minhash permutations for character n-gram signatures.
    #[serde(default = "default_minhash_permutations")]
    pub minhash_permutations: usize,
    /// Candidates returned per vector query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum vector similarity for a candidate to be returned.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,
    /// Dimension of per-field embeddings.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub hnsw: HnswParams,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            signature_seeds: default_signature_seeds(),
            minhash_permutations: default_minhash_permutations(),
            top_k: default_top_k(),
            similarity_floor: default_similarity_floor(),
            dimension: default_dimension(),
            hnsw: HnswParams::default(),
        }
    }
}

// ============================================================================
// EMBEDDING
// ============================================================================

fn default_embedding_cache_capacity() -> u64 {
    100_000
}

fn default_call_timeout_ms() -> u64 {
    2_000
}

fn default_embed_batch_size() -> usize {
    64
}

/// Configuration for embedding computation during index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Bounded capacity of the normalized-text embedding cache.
    #[serde(default = "default_embedding_cache_capacity")]
    pub cache_capacity: u64,
    /// Per provider-call timeout; a timed-out call degrades to a zero vector.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Texts per provider batch call.
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_embedding_cache_capacity(),
            call_timeout_ms: default_call_timeout_ms(),
            batch_size: default_embed_batch_size(),
        }
    }
}

// ============================================================================
// RESOURCE GOVERNOR
// ============================================================================

fn default_sample_interval_pairs() -> u64 {
    1_024
}

/// Policy for sampled memory-pressure checks during a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Pairs compared between pressure samples.
    #[serde(default = "default_sample_interval_pairs")]
    pub sample_interval_pairs: u64,
    /// Usage above this many bytes counts as critical pressure.
    pub threshold_bytes: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            sample_interval_pairs: default_sample_interval_pairs(),
            threshold_bytes: usize::MAX,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

fn default_phase2_trigger_ratio() -> f64 {
    0.01
}

/// Top-level configuration for one resolution engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ordered rule list; order is priority, first non-NoMatch wins.
    pub rules: Vec<MatchRule>,
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub trust: TrustConfig,
    #[serde(default)]
    pub survivorship: SurvivorshipConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    /// Approximate blocking (phase 2) runs when phase 1 confirmed fewer
    /// matches than this fraction of the batch.
    #[serde(default = "default_phase2_trigger_ratio")]
    pub phase2_trigger_ratio: f64,
    /// Whole-batch deadline; expiry yields an explicitly incomplete result.
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,
}

impl EngineConfig {
    /// Fail-fast validation of everything `MatchRule::new` and the trust
    /// constructor cannot see on their own.
    pub fn validate(&self) -> CoreResult<()> {
        if self.rules.is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "at least one match rule is required".to_string(),
            });
        }
        if self.blocking.fields.is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "at least one blocking field is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.phase2_trigger_ratio) {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "phase2_trigger_ratio {} outside [0, 1]",
                    self.phase2_trigger_ratio
                ),
            });
        }
        if self.index.top_k == 0 {
            return Err(CoreError::InvalidConfig {
                message: "index.top_k must be at least 1".to_string(),
            });
        }
        if self.index.dimension == 0 {
            return Err(CoreError::InvalidConfig {
                message: "index.dimension must be at least 1".to_string(),
            });
        }
        self.trust.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparators::Comparator;

    fn minimal_config() -> EngineConfig {
        EngineConfig {
            rules: vec![MatchRule::new(
                "ssn",
                vec![FieldSpec::new("ssn", Comparator::Exact, 1.0)],
                0.9,
            )
            .unwrap()],
            blocking: BlockingConfig::new(vec!["ssn".to_string()]),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            trust: TrustConfig::default(),
            survivorship: SurvivorshipConfig::default(),
            governor: GovernorConfig::default(),
            phase2_trigger_ratio: 0.01,
            batch_timeout_ms: None,
        }
    }

    #[test]
    fn minimal_config_validates() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn empty_rules_rejected() {
        let mut cfg = minimal_config();
        cfg.rules.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_blocking_fields_rejected() {
        let mut cfg = minimal_config();
        cfg.blocking.fields.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_trigger_ratio_rejected() {
        let mut cfg = minimal_config();
        cfg.phase2_trigger_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }
}
