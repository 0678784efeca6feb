//! Pairwise match outcomes and candidate proposals.

use serde::{Deserialize, Serialize};

use super::record::RecordId;

/// Classification of a pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Every evaluated field agreed; confidence is exactly 1.0.
    Exact,
    /// Confidence reached the rule's minimum.
    Fuzzy,
    /// Confidence reached 80% of the rule's minimum; needs review.
    Potential,
    /// No rule produced a confirmable outcome.
    NoMatch,
    /// Evaluation failed for this pair; isolated, never batch-fatal.
    Error,
}

impl MatchType {
    /// Confirmed outcomes participate in clustering.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MatchType::Exact | MatchType::Fuzzy | MatchType::Potential)
    }
}

/// Result of evaluating one record pair against the rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id1: RecordId,
    pub id2: RecordId,
    pub match_type: MatchType,
    /// In [0, 1]. Zero for NoMatch and Error.
    pub confidence: f64,
    /// Rule that produced the outcome, if any rule got that far.
    pub rule_id: Option<String>,
}

impl MatchResult {
    pub fn no_match(id1: RecordId, id2: RecordId) -> Self {
        Self {
            id1,
            id2,
            match_type: MatchType::NoMatch,
            confidence: 0.0,
            rule_id: None,
        }
    }

    pub fn error(id1: RecordId, id2: RecordId) -> Self {
        Self {
            id1,
            id2,
            match_type: MatchType::Error,
            confidence: 0.0,
            rule_id: None,
        }
    }
}

/// A record proposed by the similarity index, prior to rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: RecordId,
    /// Retrieval score in [0, 1]; not a match confidence.
    pub score: f32,
}
