//! End-to-end batch resolution.
//!
//! [`ResolutionEngine`] wires the whole pipeline together: per-batch index
//! build, two-phase matching, connected-component clustering, trust scoring
//! and survivorship. Construction validates the entire configuration, so a
//! value of this type can always resolve batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use record_link_core::config::EngineConfig;
use record_link_core::survivorship::CustomResolver;
use record_link_core::types::{Cluster, GoldenRecord, MatchResult, Record, RecordId, TrustScore};
use record_link_core::{ClusterBuilder, SurvivorshipResolver, TrustScorer};
use record_link_embeddings::batch::BatchEmbedder;
use record_link_embeddings::provider::EmbeddingProvider;
use record_link_index::{BlockingKeyGenerator, SimilarityIndex};

use crate::error::EngineResult;
use crate::governor::{NoopGovernor, ResourceGovernor};
use crate::orchestrator::BatchMatchOrchestrator;
use crate::rules::MatchRuleEngine;
use crate::stats::BatchStats;

/// Everything one batch produced.
#[derive(Debug)]
pub struct BatchOutcome {
    /// All pair evaluations, confirmed or not.
    pub results: Vec<MatchResult>,
    pub clusters: Vec<Cluster>,
    pub golden_records: Vec<GoldenRecord>,
    pub stats: BatchStats,
}

pub struct ResolutionEngine {
    config: EngineConfig,
    rules: MatchRuleEngine,
    blocking: BlockingKeyGenerator,
    embedder: BatchEmbedder,
    trust: TrustScorer,
    survivorship: SurvivorshipResolver,
    governor: Arc<dyn ResourceGovernor>,
    cancel: Arc<AtomicBool>,
}

impl ResolutionEngine {
    /// Validates the configuration and builds every component. No record is
    /// touched until [`ResolutionEngine::resolve_batch`].
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> EngineResult<Self> {
        Self::with_custom_resolvers(config, provider, HashMap::new())
    }

    /// Like [`ResolutionEngine::new`], with caller-supplied resolvers for
    /// fields mapped to the custom survivorship strategy.
    pub fn with_custom_resolvers(
        config: EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        customs: HashMap<String, CustomResolver>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let trust = TrustScorer::new(config.trust.clone())?;
        let survivorship =
            SurvivorshipResolver::new(config.survivorship.clone(), config.trust.clone(), customs)?;
        let blocking = BlockingKeyGenerator::new(&config.blocking);
        let embedder = BatchEmbedder::new(provider, config.embedding.clone());
        let rules = MatchRuleEngine::new(config.rules.clone());
        Ok(Self {
            config,
            rules,
            blocking,
            embedder,
            trust,
            survivorship,
            governor: Arc::new(NoopGovernor),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_governor(mut self, governor: Arc<dyn ResourceGovernor>) -> Self {
        self.governor = governor;
        self
    }

    /// Shared flag that stops an in-flight batch at the next pair boundary.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one batch of records into match results, clusters and golden
    /// records.
    ///
    /// A cancelled batch returns the results gathered so far with no
    /// clusters or golden records; a deadline-expired batch still clusters
    /// and merges what it matched, marked incomplete in the stats. Only
    /// sustained memory pressure turns into an error.
    pub async fn resolve_batch(&self, records: &[Record]) -> EngineResult<BatchOutcome> {
        let index = SimilarityIndex::build(
            records,
            &self.config.rules,
            &self.embedder,
            &self.config.index,
        )
        .await?;

        let output = BatchMatchOrchestrator::new(&self.rules, &index, &self.blocking, &self.config)
            .with_governor(self.governor.clone())
            .with_cancellation(self.cancel.clone())
            .run(records)?;

        if self.cancel.load(Ordering::Relaxed) {
            info!(results = output.results.len(), "batch cancelled before clustering");
            return Ok(BatchOutcome {
                results: output.results,
                clusters: Vec::new(),
                golden_records: Vec::new(),
                stats: output.stats,
            });
        }

        let clusters = ClusterBuilder::new().build(&output.results);

        let by_id: HashMap<&RecordId, &Record> =
            records.iter().map(|r| (&r.id, r)).collect();
        let mut trust_scores: HashMap<RecordId, TrustScore> = HashMap::new();
        let mut golden_records = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let members: Vec<&Record> = cluster
                .members
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .collect();
            for record in &members {
                trust_scores
                    .entry(record.id.clone())
                    .or_insert_with(|| self.trust.score(record));
            }
            golden_records.push(self.survivorship.merge(cluster, &members, &trust_scores)?);
        }

        info!(
            records = records.len(),
            clusters = clusters.len(),
            golden_records = golden_records.len(),
            incomplete = output.stats.incomplete,
            "batch resolved"
        );
        Ok(BatchOutcome {
            results: output.results,
            clusters,
            golden_records,
            stats: output.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_link_core::comparators::{Comparator, FuzzyMethod};
    use record_link_core::config::{
        BlockingConfig, EmbeddingConfig, FieldSpec, GovernorConfig, IndexConfig, MatchRule,
        SurvivorshipConfig, TrustConfig,
    };
    use record_link_embeddings::provider::HashEmbeddingProvider;

    fn engine() -> ResolutionEngine {
        let config = EngineConfig {
            rules: vec![MatchRule::new(
                "name",
                vec![FieldSpec::new(
                    "name",
                    Comparator::Fuzzy(FuzzyMethod::JaroWinkler),
                    1.0,
                )],
                0.9,
            )
            .unwrap()],
            blocking: BlockingConfig::new(vec!["name".to_string()]),
            index: IndexConfig {
                dimension: 64,
                ..IndexConfig::default()
            },
            embedding: EmbeddingConfig::default(),
            trust: TrustConfig::default(),
            survivorship: SurvivorshipConfig::default(),
            governor: GovernorConfig::default(),
            phase2_trigger_ratio: 0.01,
            batch_timeout_ms: None,
        };
        ResolutionEngine::new(config, Arc::new(HashEmbeddingProvider::new(64))).unwrap()
    }

    #[tokio::test]
    async fn duplicates_collapse_into_one_golden_record() {
        let records = vec![
            Record::new("a", "crm").with_field("name", "Acme Corporation"),
            Record::new("b", "erp").with_field("name", "Acme Corporation"),
            Record::new("c", "web").with_field("name", "Zenith Waterworks"),
        ];
        let outcome = engine().resolve_batch(&records).await.unwrap();

        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.golden_records.len(), 1);
        let golden = &outcome.golden_records[0];
        assert_eq!(golden.provenance.len(), 2);
        assert_eq!(
            golden.fields.get("name").map(|v| v.as_text()),
            Some("Acme Corporation".to_string())
        );
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_batch() {
        let config = EngineConfig {
            rules: Vec::new(),
            blocking: BlockingConfig::new(vec!["name".to_string()]),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            trust: TrustConfig::default(),
            survivorship: SurvivorshipConfig::default(),
            governor: GovernorConfig::default(),
            phase2_trigger_ratio: 0.01,
            batch_timeout_ms: None,
        };
        assert!(ResolutionEngine::new(config, Arc::new(HashEmbeddingProvider::new(64))).is_err());
    }

    #[tokio::test]
    async fn cancelled_batch_produces_no_clusters() {
        let engine = engine();
        engine.cancellation_flag().store(true, Ordering::Relaxed);
        let records = vec![
            Record::new("a", "crm").with_field("name", "Acme Corporation"),
            Record::new("b", "erp").with_field("name", "Acme Corporation"),
        ];
        let outcome = engine.resolve_batch(&records).await.unwrap();
        assert!(outcome.stats.incomplete);
        assert!(outcome.clusters.is_empty());
        assert!(outcome.golden_records.is_empty());
    }
}
