//! Match rules and field specifications.
//!
//! A [`MatchRule`] can only be obtained through [`MatchRule::new`], which
//! enforces the construction invariants: non-empty field list, unique field
//! names, per-field weights in (0, 1] summing to 1.0 (± epsilon), and
//! min_confidence in (0, 1].

use serde::{Deserialize, Serialize};

use crate::comparators::Comparator;
use crate::error::{CoreError, CoreResult};

/// Tolerance on the weight-sum invariant.
pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

/// How one field contributes to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub comparator: Comparator,
    /// Contribution to the rule confidence, in (0, 1].
    pub weight: f64,
    /// Per-field similarity floor; below it the field contributes 0.
    #[serde(default)]
    pub threshold: f64,
    /// When true, absence of the value on either record fails the rule.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, comparator: Comparator, weight: f64) -> Self {
        Self {
            name: name.into(),
            comparator,
            weight,
            threshold: 0.0,
            required: false,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// An ordered, weighted combination of field comparisons.
///
/// Fields are private: a value of this type is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatchRule")]
pub struct MatchRule {
    id: String,
    fields: Vec<FieldSpec>,
    min_confidence: f64,
}

/// Unvalidated deserialization shape for [`MatchRule`].
#[derive(Deserialize)]
struct RawMatchRule {
    id: String,
    fields: Vec<FieldSpec>,
    min_confidence: f64,
}

impl TryFrom<RawMatchRule> for MatchRule {
    type Error = CoreError;

    fn try_from(raw: RawMatchRule) -> CoreResult<Self> {
        MatchRule::new(raw.id, raw.fields, raw.min_confidence)
    }
}

impl MatchRule {
    pub fn new(
        id: impl Into<String>,
        fields: Vec<FieldSpec>,
        min_confidence: f64,
    ) -> CoreResult<Self> {
        let id = id.into();

        if fields.is_empty() {
            return Err(CoreError::InvalidRule {
                rule_id: id,
                message: "rule has no fields".to_string(),
            });
        }

        for (i, f) in fields.iter().enumerate() {
            if f.name.trim().is_empty() {
                return Err(CoreError::InvalidRule {
                    rule_id: id,
                    message: format!("field {i} has an empty name"),
                });
            }
            if !(f.weight > 0.0 && f.weight <= 1.0) {
                return Err(CoreError::InvalidRule {
                    rule_id: id,
                    message: format!("field '{}' weight {} outside (0, 1]", f.name, f.weight),
                });
            }
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(CoreError::InvalidRule {
                    rule_id: id,
                    message: format!("duplicate field name '{}'", f.name),
                });
            }
        }

        let sum: f64 = fields.iter().map(|f| f.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(CoreError::WeightSum {
                context: format!("rule '{id}' field weights"),
                sum,
                epsilon: WEIGHT_SUM_EPSILON,
            });
        }

        if !(min_confidence > 0.0 && min_confidence <= 1.0) {
            return Err(CoreError::InvalidRule {
                rule_id: id,
                message: format!("min_confidence {min_confidence} outside (0, 1]"),
            });
        }

        Ok(Self {
            id,
            fields,
            min_confidence,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }
}
