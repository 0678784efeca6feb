//! Per-record trust scoring.
//!
//! Trust is a weighted combination of quality dimensions:
//!
//! | Dimension    | Computed from                                        |
//! |--------------|------------------------------------------------------|
//! | completeness | fraction of configured fields present                |
//! | accuracy     | fraction of configured validators passing            |
//! | consistency  | fraction of cross-field rules satisfied              |
//! | timeliness   | exponential decay of record age (configured half-life)|
//! | reliability  | static per-source weight                             |
//! | uniqueness   | placeholder constant (dataset-wide impl pending)     |
//!
//! Weights are validated to sum to 1.0 before a scorer can exist.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::TrustConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{Record, TrustScore};

/// Value of the uniqueness placeholder dimension. Its default weight is 0,
/// so it contributes nothing until the dimension is actually implemented.
const UNIQUENESS_PLACEHOLDER: f64 = 1.0;

/// Timeliness applied to records without an `updated_at` timestamp.
const TIMELINESS_UNKNOWN: f64 = 0.5;

/// Computes trust scores from a validated [`TrustConfig`].
pub struct TrustScorer {
    config: TrustConfig,
    validators: HashMap<String, Regex>,
}

impl TrustScorer {
    /// Validates the configuration and compiles every validator pattern.
    /// A pattern that does not compile is a construction-time error.
    pub fn new(config: TrustConfig) -> CoreResult<Self> {
        config.validate()?;
        let mut validators = HashMap::with_capacity(config.validators.len());
        for (field, pattern) in &config.validators {
            let re = Regex::new(pattern).map_err(|source| CoreError::InvalidValidator {
                field: field.clone(),
                source,
            })?;
            validators.insert(field.clone(), re);
        }
        Ok(Self { config, validators })
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Score a record against the current wall clock.
    pub fn score(&self, record: &Record) -> TrustScore {
        self.score_at(record, Utc::now())
    }

    /// Score a record with an explicit reference time, for testability.
    pub fn score_at(&self, record: &Record, now: DateTime<Utc>) -> TrustScore {
        let completeness = self.completeness(record);
        let accuracy = self.accuracy(record);
        let consistency = self.consistency(record);
        let timeliness = self.timeliness(record, now);
        let reliability = self
            .config
            .source_reliability
            .get(record.source.as_str())
            .copied()
            .unwrap_or(self.config.default_reliability);
        let uniqueness = UNIQUENESS_PLACEHOLDER;

        let w = &self.config.weights;
        let overall = (w.completeness * completeness
            + w.accuracy * accuracy
            + w.consistency * consistency
            + w.timeliness * timeliness
            + w.reliability * reliability
            + w.uniqueness * uniqueness)
            .clamp(0.0, 1.0);

        TrustScore {
            overall,
            completeness,
            accuracy,
            consistency,
            timeliness,
            reliability,
            uniqueness,
        }
    }

    fn completeness(&self, record: &Record) -> f64 {
        let fields = &self.config.completeness_fields;
        if fields.is_empty() {
            return 1.0;
        }
        let present = fields.iter().filter(|f| record.present(f).is_some()).count();
        present as f64 / fields.len() as f64
    }

    fn accuracy(&self, record: &Record) -> f64 {
        if self.validators.is_empty() {
            return 1.0;
        }
        let mut evaluated = 0usize;
        let mut passing = 0usize;
        for (field, re) in &self.validators {
            if let Some(value) = record.present(field) {
                evaluated += 1;
                if re.is_match(&value.as_text()) {
                    passing += 1;
                }
            }
        }
        if evaluated == 0 {
            return 1.0;
        }
        passing as f64 / evaluated as f64
    }

    fn consistency(&self, record: &Record) -> f64 {
        let rules = &self.config.consistency_rules;
        if rules.is_empty() {
            return 1.0;
        }
        let satisfied = rules
            .iter()
            .filter(|r| {
                record.present(&r.if_present).is_none() || record.present(&r.then_present).is_some()
            })
            .count();
        satisfied as f64 / rules.len() as f64
    }

    fn timeliness(&self, record: &Record, now: DateTime<Utc>) -> f64 {
        match record.updated_at {
            Some(ts) => {
                let age_days = (now - ts).num_seconds().max(0) as f64 / 86_400.0;
                0.5f64.powf(age_days / self.config.timeliness_half_life_days)
            }
            None => TIMELINESS_UNKNOWN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scorer_with(mut f: impl FnMut(&mut TrustConfig)) -> TrustScorer {
        let mut cfg = TrustConfig::default();
        f(&mut cfg);
        TrustScorer::new(cfg).unwrap()
    }

    #[test]
    fn completeness_counts_configured_fields() {
        let scorer = scorer_with(|c| {
            c.completeness_fields = vec!["name".into(), "phone".into(), "email".into()];
        });
        let record = Record::new("r1", "crm")
            .with_field("name", "Ada")
            .with_field("phone", "n/a");
        let score = scorer.score(&record);
        assert!((score.completeness - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn accuracy_uses_validators_on_present_fields() {
        let scorer = scorer_with(|c| {
            c.validators
                .insert("ssn".into(), r"^\d{3}-\d{2}-\d{4}$".into());
            c.validators.insert("zip".into(), r"^\d{5}$".into());
        });
        let record = Record::new("r1", "crm")
            .with_field("ssn", "123-45-6789")
            .with_field("zip", "ABC");
        assert!((scorer.score(&record).accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_validator_pattern_fails_construction() {
        let mut cfg = TrustConfig::default();
        cfg.validators.insert("ssn".into(), "[unclosed".into());
        assert!(matches!(
            TrustScorer::new(cfg),
            Err(CoreError::InvalidValidator { .. })
        ));
    }

    #[test]
    fn timeliness_halves_at_half_life() {
        let scorer = scorer_with(|c| c.timeliness_half_life_days = 30.0);
        let now = Utc::now();
        let record = Record::new("r1", "crm").with_updated_at(now - Duration::days(30));
        let score = scorer.score_at(&record, now);
        assert!((score.timeliness - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unknown_source_gets_default_reliability() {
        let scorer = scorer_with(|c| {
            c.source_reliability.insert("crm".into(), 0.9);
        });
        let known = Record::new("r1", "crm");
        let unknown = Record::new("r2", "mystery");
        assert_eq!(scorer.score(&known).reliability, 0.9);
        assert_eq!(scorer.score(&unknown).reliability, 0.5);
    }

    #[test]
    fn consistency_checks_cross_field_rules() {
        let scorer = scorer_with(|c| {
            c.consistency_rules.push(crate::config::ConsistencyRule {
                name: "city-needs-state".into(),
                if_present: "city".into(),
                then_present: "state".into(),
            });
        });
        let bad = Record::new("r1", "crm").with_field("city", "Omaha");
        let good = Record::new("r2", "crm")
            .with_field("city", "Omaha")
            .with_field("state", "NE");
        assert_eq!(scorer.score(&bad).consistency, 0.0);
        assert_eq!(scorer.score(&good).consistency, 1.0);
    }
}
