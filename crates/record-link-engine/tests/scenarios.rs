//! End-to-end resolution scenarios over the full pipeline: index build,
//! two-phase matching, clustering, trust scoring and survivorship.

use std::collections::HashMap;
use std::sync::Arc;

use record_link_core::comparators::{Comparator, FuzzyMethod};
use record_link_core::config::{
    BlockingConfig, EmbeddingConfig, EngineConfig, FieldSpec, GovernorConfig, IndexConfig,
    MatchRule, SurvivorshipConfig, TrustConfig,
};
use record_link_core::types::{FieldValue, MatchType, Record, RecordId};
use record_link_core::ClusterBuilder;
use record_link_embeddings::provider::HashEmbeddingProvider;
use record_link_engine::ResolutionEngine;

fn config(rules: Vec<MatchRule>, blocking_fields: &[&str]) -> EngineConfig {
    EngineConfig {
        rules,
        blocking: BlockingConfig::new(blocking_fields.iter().map(|s| s.to_string()).collect()),
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
    }
}

fn engine(config: EngineConfig) -> ResolutionEngine {
    ResolutionEngine::new(config, Arc::new(HashEmbeddingProvider::new(64))).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> FieldValue {
    FieldValue::Date(chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

#[tokio::test]
async fn identical_ssn_yields_exact_match_at_full_confidence() {
    let rules = vec![MatchRule::new(
        "ssn",
        vec![FieldSpec::new("ssn", Comparator::Exact, 1.0)],
        0.9,
    )
    .unwrap()];
    let records = vec![
        Record::new("a", "crm").with_field("ssn", "123-45-6789"),
        Record::new("b", "erp").with_field("ssn", "123-45-6789"),
    ];

    let outcome = engine(config(rules, &["ssn"])).resolve_batch(&records).await.unwrap();

    let exact: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.match_type == MatchType::Exact)
        .collect();
    assert_eq!(exact.len(), 1);
    assert!((exact[0].confidence - 1.0).abs() < 1e-9);
    assert_eq!(exact[0].rule_id.as_deref(), Some("ssn"));
}

#[tokio::test]
async fn fuzzy_name_with_exact_dob_confirms_above_080() {
    let rules = vec![MatchRule::new(
        "person",
        vec![
            FieldSpec::new("first_name", Comparator::Fuzzy(FuzzyMethod::JaroWinkler), 0.3),
            FieldSpec::new("last_name", Comparator::Fuzzy(FuzzyMethod::JaroWinkler), 0.4),
            FieldSpec::new("dob", Comparator::Exact, 0.3),
        ],
        0.5,
    )
    .unwrap()];
    let records = vec![
        Record::new("a", "crm")
            .with_field("first_name", "John")
            .with_field("last_name", "Doe")
            .with_field("dob", date(1990, 1, 1)),
        Record::new("b", "erp")
            .with_field("first_name", "Jon")
            .with_field("last_name", "Doe")
            .with_field("dob", date(1990, 1, 1)),
    ];

    let outcome = engine(config(rules, &["last_name"]))
        .resolve_batch(&records)
        .await
        .unwrap();

    let m = outcome
        .results
        .iter()
        .find(|r| r.match_type.is_confirmed())
        .expect("pair should confirm");
    assert_eq!(m.match_type, MatchType::Fuzzy);
    assert!(m.confidence >= 0.8, "confidence was {}", m.confidence);
    assert!(m.confidence < 1.0);
}

#[test]
fn transitive_confirmations_form_one_cluster_without_a_direct_edge() {
    use record_link_core::types::MatchResult;

    // A-B and B-C confirmed; A and C never directly compared.
    let results = vec![
        MatchResult {
            id1: RecordId::from("a"),
            id2: RecordId::from("b"),
            match_type: MatchType::Fuzzy,
            confidence: 0.92,
            rule_id: Some("name".to_string()),
        },
        MatchResult {
            id1: RecordId::from("b"),
            id2: RecordId::from("c"),
            match_type: MatchType::Fuzzy,
            confidence: 0.95,
            rule_id: Some("name".to_string()),
        },
    ];
    let clusters = ClusterBuilder::new().build(&results);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].len(), 3);
}

#[tokio::test]
async fn clustered_records_merge_into_one_golden_record() {
    let rules = vec![MatchRule::new(
        "name",
        vec![FieldSpec::new(
            "name",
            Comparator::Fuzzy(FuzzyMethod::JaroWinkler),
            1.0,
        )],
        0.9,
    )
    .unwrap()];
    let records = vec![
        Record::new("a", "crm")
            .with_field("name", "Acme Corporation")
            .with_field("city", "Berlin"),
        Record::new("b", "erp")
            .with_field("name", "Acme Corporation")
            .with_field("city", "Berlin"),
        Record::new("c", "web")
            .with_field("name", "Acme Corporation")
            .with_field("city", "Berlin"),
    ];

    let outcome = engine(config(rules, &["name"])).resolve_batch(&records).await.unwrap();

    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(outcome.clusters[0].len(), 3);
    assert_eq!(outcome.golden_records.len(), 1);
    let provenance: Vec<&str> = outcome.golden_records[0]
        .provenance
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(provenance, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn most_trusted_strategy_picks_the_more_reliable_source() {
    let rules = vec![MatchRule::new(
        "ssn",
        vec![FieldSpec::new("ssn", Comparator::Exact, 1.0)],
        0.9,
    )
    .unwrap()];
    let mut cfg = config(rules, &["ssn"]);
    cfg.trust.source_reliability =
        HashMap::from([("x".to_string(), 0.9), ("y".to_string(), 0.7)]);
    cfg.survivorship.include_audit = true;

    let records = vec![
        Record::new("a", "x")
            .with_field("ssn", "123-45-6789")
            .with_field("name", "Acme Corporation GmbH"),
        Record::new("b", "y")
            .with_field("ssn", "123-45-6789")
            .with_field("name", "ACME Corp"),
    ];

    let outcome = engine(cfg).resolve_batch(&records).await.unwrap();

    assert_eq!(outcome.golden_records.len(), 1);
    let golden = &outcome.golden_records[0];
    assert_eq!(
        golden.fields.get("name").map(|v| v.as_text()),
        Some("Acme Corporation GmbH".to_string())
    );
    // The audit trail names the winning record and strategy.
    let name_audit = golden
        .audit
        .iter()
        .find(|a| a.field == "name")
        .expect("audit entry for name");
    assert_eq!(name_audit.record_id, RecordId::from("a"));
    assert_eq!(name_audit.strategy, "most_trusted");
}

#[tokio::test]
async fn record_missing_every_required_field_never_clusters() {
    let rules = vec![MatchRule::new(
        "name-ssn",
        vec![
            FieldSpec::new("ssn", Comparator::Exact, 0.5).required(),
            FieldSpec::new("name", Comparator::Fuzzy(FuzzyMethod::JaroWinkler), 0.5),
        ],
        0.5,
    )
    .unwrap()];
    let records = vec![
        Record::new("a", "crm")
            .with_field("ssn", "123-45-6789")
            .with_field("name", "Acme Corporation"),
        Record::new("b", "erp")
            .with_field("ssn", "123-45-6789")
            .with_field("name", "Acme Corporation"),
        // Sentinel ssn: blocked with nobody meaningful, required field absent.
        Record::new("c", "web")
            .with_field("ssn", "null")
            .with_field("name", "Acme Corporation"),
    ];

    let outcome = engine(config(rules, &["name"])).resolve_batch(&records).await.unwrap();

    let c = RecordId::from("c");
    for r in &outcome.results {
        if r.id1 == c || r.id2 == c {
            assert_eq!(r.match_type, MatchType::NoMatch);
        }
    }
    assert!(outcome.clusters.iter().all(|cl| !cl.contains(&c)));
    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(outcome.clusters[0].len(), 2);
}

#[tokio::test]
async fn clustering_is_idempotent_over_unchanged_results() {
    let rules = vec![MatchRule::new(
        "name",
        vec![FieldSpec::new(
            "name",
            Comparator::Fuzzy(FuzzyMethod::JaroWinkler),
            1.0,
        )],
        0.9,
    )
    .unwrap()];
    let records = vec![
        Record::new("a", "crm").with_field("name", "Acme Corporation"),
        Record::new("b", "erp").with_field("name", "Acme Corporation"),
        Record::new("c", "web").with_field("name", "Zenith Waterworks"),
        Record::new("d", "web").with_field("name", "Zenith Waterworks"),
    ];

    let outcome = engine(config(rules, &["name"])).resolve_batch(&records).await.unwrap();

    let builder = ClusterBuilder::new();
    let once = builder.build(&outcome.results);
    let twice = builder.build(&outcome.results);
    assert_eq!(once, twice);
    assert_eq!(once, outcome.clusters);
}

#[tokio::test]
async fn disjoint_records_cost_zero_comparisons() {
    let rules = vec![MatchRule::new(
        "name",
        vec![FieldSpec::new(
            "name",
            Comparator::Fuzzy(FuzzyMethod::JaroWinkler),
            1.0,
        )],
        0.9,
    )
    .unwrap()];
    // No shared blocking key, nothing inside the similarity radius.
    let records = vec![
        Record::new("a", "crm").with_field("name", "Acme Corporation"),
        Record::new("b", "erp").with_field("name", "Zenith Waterworks"),
        Record::new("c", "web").with_field("name", "Quorum Logistics"),
    ];

    let outcome = engine(config(rules, &["name"])).resolve_batch(&records).await.unwrap();

    assert_eq!(outcome.stats.pairs_compared, 0);
    assert!(outcome.stats.phase2_ran);
    assert!(outcome.clusters.is_empty());
    assert!(outcome.golden_records.is_empty());
}
