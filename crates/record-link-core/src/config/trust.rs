//! Trust configuration: source reliability and quality-dimension weights.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::rule::WEIGHT_SUM_EPSILON;
use crate::error::{CoreError, CoreResult};

/// Weights of the quality dimensions combined into a trust score.
///
/// Must sum to 1.0 (± epsilon); validated through [`TrustConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub reliability: f64,
    pub uniqueness: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: 0.25,
            accuracy: 0.20,
            consistency: 0.15,
            timeliness: 0.15,
            reliability: 0.25,
            uniqueness: 0.0,
        }
    }
}

impl DimensionWeights {
    pub fn sum(&self) -> f64 {
        self.completeness
            + self.accuracy
            + self.consistency
            + self.timeliness
            + self.reliability
            + self.uniqueness
    }
}

/// A cross-field consistency rule: when `if_present` carries a value,
/// `then_present` must too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyRule {
    pub name: String,
    pub if_present: String,
    pub then_present: String,
}

fn default_reliability() -> f64 {
    0.5
}

fn default_half_life_days() -> f64 {
    365.0
}

/// Configuration for per-record trust scoring and merge tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Static reliability per source system, in [0, 1].
    #[serde(default)]
    pub source_reliability: HashMap<String, f64>,
    /// Reliability applied to sources missing from the table.
    #[serde(default = "default_reliability")]
    pub default_reliability: f64,
    #[serde(default)]
    pub weights: DimensionWeights,
    /// Per-field validity regexes, applied to the field's text rendering.
    #[serde(default)]
    pub validators: HashMap<String, String>,
    #[serde(default)]
    pub consistency_rules: Vec<ConsistencyRule>,
    /// Fields counted toward completeness. Empty means completeness is 1.0.
    #[serde(default)]
    pub completeness_fields: Vec<String>,
    /// Half-life of the timeliness decay, in days.
    #[serde(default = "default_half_life_days")]
    pub timeliness_half_life_days: f64,
    /// Tie-break order for survivorship; earlier sources win.
    #[serde(default)]
    pub source_priority: Vec<String>,
    /// Relative update frequency per source, used by MOST_RECENT.
    #[serde(default)]
    pub source_update_frequency: HashMap<String, f64>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            source_reliability: HashMap::new(),
            default_reliability: default_reliability(),
            weights: DimensionWeights::default(),
            validators: HashMap::new(),
            consistency_rules: Vec::new(),
            completeness_fields: Vec::new(),
            timeliness_half_life_days: default_half_life_days(),
            source_priority: Vec::new(),
            source_update_frequency: HashMap::new(),
        }
    }
}

impl TrustConfig {
    pub fn validate(&self) -> CoreResult<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(CoreError::WeightSum {
                context: "trust dimension weights".to_string(),
                sum,
                epsilon: WEIGHT_SUM_EPSILON,
            });
        }
        for (source, r) in &self.source_reliability {
            if !(0.0..=1.0).contains(r) {
                return Err(CoreError::InvalidConfig {
                    message: format!("reliability {r} for source '{source}' outside [0, 1]"),
                });
            }
        }
        if self.timeliness_half_life_days <= 0.0 {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "timeliness_half_life_days {} must be positive",
                    self.timeliness_half_life_days
                ),
            });
        }
        Ok(())
    }

    /// Rank of a source in the priority order; unlisted sources rank last.
    pub fn priority_rank(&self, source: &str) -> usize {
        self.source_priority
            .iter()
            .position(|s| s == source)
            .unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(TrustConfig::default().validate().is_ok());
    }

    #[test]
    fn skewed_weights_rejected() {
        let mut cfg = TrustConfig::default();
        cfg.weights.completeness = 0.9;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, CoreError::WeightSum { .. }));
    }

    #[test]
    fn out_of_range_reliability_rejected() {
        let mut cfg = TrustConfig::default();
        cfg.source_reliability.insert("crm".to_string(), 1.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn priority_rank_orders_sources() {
        let mut cfg = TrustConfig::default();
        cfg.source_priority = vec!["crm".to_string(), "erp".to_string()];
        assert!(cfg.priority_rank("crm") < cfg.priority_rank("erp"));
        assert_eq!(cfg.priority_rank("unknown"), usize::MAX);
    }
}
