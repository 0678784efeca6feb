//! Ordered rule evaluation over record pairs.
//!
//! Rules run in configured order; the first rule that produces any outcome
//! other than NO_MATCH decides the pair. Within a rule, an exact field below
//! 1.0 fails the rule immediately, and a required field missing on either
//! side fails the rule. Confidence is the weight-normalized sum of the
//! evaluated field similarities.
//!
//! Evaluation failures (a missing embedding for an indexed field) are caught
//! per pair and yield an ERROR result; they never abort the batch.

use tracing::warn;

use record_link_core::comparators::{cosine_similarity, exact_similarity, Comparator};
use record_link_core::config::MatchRule;
use record_link_core::types::{MatchResult, MatchType, Record, RecordId};

/// Source of per-field embeddings for the embedding comparator.
///
/// Implemented by the similarity index, which embeds every rule-referenced
/// field at batch start.
pub trait FieldVectorSource: Sync {
    fn field_vector(&self, id: &RecordId, field: &str) -> Option<&[f32]>;
}

impl FieldVectorSource for record_link_index::SimilarityIndex {
    fn field_vector(&self, id: &RecordId, field: &str) -> Option<&[f32]> {
        record_link_index::SimilarityIndex::field_vector(self, id, field)
    }
}

/// Stateless over record pairs; safe to share across matching workers.
#[derive(Debug, Clone)]
pub struct MatchRuleEngine {
    rules: Vec<MatchRule>,
}

enum RuleOutcome {
    Matched { match_type: MatchType, confidence: f64 },
    NoMatch,
    Failed(String),
}

impl MatchRuleEngine {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Evaluate one pair against the rule set. Infallible by contract: any
    /// evaluation failure is folded into an ERROR result for this pair.
    pub fn match_pair(
        &self,
        a: &Record,
        b: &Record,
        vectors: &dyn FieldVectorSource,
    ) -> MatchResult {
        for rule in &self.rules {
            match Self::evaluate_rule(rule, a, b, vectors) {
                RuleOutcome::Matched {
                    match_type,
                    confidence,
                } => {
                    return MatchResult {
                        id1: a.id.clone(),
                        id2: b.id.clone(),
                        match_type,
                        confidence,
                        rule_id: Some(rule.id().to_string()),
                    };
                }
                RuleOutcome::NoMatch => continue,
                RuleOutcome::Failed(message) => {
                    warn!(
                        rule = rule.id(),
                        id1 = %a.id,
                        id2 = %b.id,
                        message,
                        "pair evaluation failed"
                    );
                    return MatchResult::error(a.id.clone(), b.id.clone());
                }
            }
        }
        MatchResult::no_match(a.id.clone(), b.id.clone())
    }

    fn evaluate_rule(
        rule: &MatchRule,
        a: &Record,
        b: &Record,
        vectors: &dyn FieldVectorSource,
    ) -> RuleOutcome {
        let mut score = 0.0;
        let mut total = 0.0;

        for spec in rule.fields() {
            let va = a.present(&spec.name);
            let vb = b.present(&spec.name);

            let (va, vb) = match (va, vb) {
                (Some(va), Some(vb)) => (va, vb),
                // Required fields are hard constraints.
                _ if spec.required => return RuleOutcome::NoMatch,
                // Nothing to compare; the field abstains.
                _ => continue,
            };

            let sim = match &spec.comparator {
                Comparator::Exact => {
                    let s = exact_similarity(&va.as_text(), &vb.as_text());
                    if s < 1.0 {
                        // Exact fields are all-or-nothing for the rule.
                        return RuleOutcome::NoMatch;
                    }
                    s
                }
                Comparator::Fuzzy(method) => method.similarity(&va.as_text(), &vb.as_text()),
                Comparator::Embedding => {
                    let ea = vectors.field_vector(&a.id, &spec.name);
                    let eb = vectors.field_vector(&b.id, &spec.name);
                    match (ea, eb) {
                        (Some(ea), Some(eb)) => cosine_similarity(ea, eb),
                        _ => {
                            return RuleOutcome::Failed(format!(
                                "no embedding for field '{}'",
                                spec.name
                            ))
                        }
                    }
                }
            };

            let sim = if sim < spec.threshold { 0.0 } else { sim };
            score += sim * spec.weight;
            total += spec.weight;
        }

        if total == 0.0 {
            return RuleOutcome::NoMatch;
        }

        let confidence = (score / total).clamp(0.0, 1.0);
        let match_type = if (1.0 - confidence).abs() < 1e-9 {
            MatchType::Exact
        } else if confidence >= rule.min_confidence() {
            MatchType::Fuzzy
        } else if confidence >= rule.min_confidence() * 0.8 {
            MatchType::Potential
        } else {
            return RuleOutcome::NoMatch;
        };

        RuleOutcome::Matched {
            match_type,
            confidence,
        }
    }
}
