//! Trust-weighted conflict resolution: merging a cluster into a golden record.
//!
//! For every field present in any record of the cluster, missing values are
//! dropped from the candidate set first, then the configured strategy picks
//! the winner. Candidates are ordered by record id before selection and a
//! strictly-better comparison replaces the running winner, so equal keys
//! resolve to the lowest record id and the merge is deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::config::{SurvivorshipConfig, SurvivorshipStrategy, TrustConfig};
use crate::error::{CoreError, CoreResult};
use crate::types::{
    Cluster, ConfidenceSummary, FieldAudit, FieldValue, GoldenRecord, Record, RecordId, TrustScore,
};

/// One surviving-value candidate for a field.
pub struct FieldCandidate<'a> {
    pub record: &'a Record,
    pub value: &'a FieldValue,
    pub trust: f64,
}

/// Caller-supplied strategy: receives the field name and all candidates
/// (values, sources, trust scores) and returns the winning value.
pub type CustomResolver =
    Arc<dyn Fn(&str, &[FieldCandidate<'_>]) -> Option<FieldValue> + Send + Sync>;

/// Merges clustered records field-by-field into golden records.
pub struct SurvivorshipResolver {
    config: SurvivorshipConfig,
    trust: TrustConfig,
    customs: HashMap<String, CustomResolver>,
}

impl std::fmt::Debug for SurvivorshipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurvivorshipResolver")
            .field("config", &self.config)
            .field("trust", &self.trust)
            .field("customs", &self.customs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SurvivorshipResolver {
    /// Fails fast when a field is mapped to the CUSTOM strategy without a
    /// registered resolver, or when CUSTOM is used as the default strategy.
    pub fn new(
        config: SurvivorshipConfig,
        trust: TrustConfig,
        customs: HashMap<String, CustomResolver>,
    ) -> CoreResult<Self> {
        if config.default_strategy == SurvivorshipStrategy::Custom {
            return Err(CoreError::InvalidConfig {
                message: "custom cannot be the default survivorship strategy".to_string(),
            });
        }
        for (field, strategy) in &config.field_strategies {
            if *strategy == SurvivorshipStrategy::Custom && !customs.contains_key(field) {
                return Err(CoreError::MissingCustomResolver {
                    field: field.clone(),
                });
            }
        }
        Ok(Self {
            config,
            trust,
            customs,
        })
    }

    /// Merge the records of one cluster into a golden record.
    ///
    /// `records` must hold exactly the cluster's member records; `trust`
    /// maps record ids to their scores (missing entries score 0).
    pub fn merge(
        &self,
        cluster: &Cluster,
        records: &[&Record],
        trust: &HashMap<RecordId, TrustScore>,
    ) -> CoreResult<GoldenRecord> {
        if records.is_empty() || cluster.is_empty() {
            return Err(CoreError::EmptyCluster);
        }

        // Candidate records sorted by id: ties resolve to the lowest id.
        let mut sorted: Vec<&Record> = records.to_vec();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let field_names: BTreeSet<&str> = sorted
            .iter()
            .flat_map(|r| r.fields.keys().map(String::as_str))
            .collect();

        let mut fields = BTreeMap::new();
        let mut audit = Vec::new();

        for name in field_names {
            let candidates: Vec<FieldCandidate<'_>> = sorted
                .iter()
                .filter_map(|r| {
                    r.present(name).map(|value| FieldCandidate {
                        record: r,
                        value,
                        trust: trust.get(&r.id).map(|t| t.overall).unwrap_or(0.0),
                    })
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let strategy = self.config.strategy_for(name);
            let (value, winner) = match strategy {
                SurvivorshipStrategy::Custom => {
                    // Registration checked at construction.
                    let resolver = &self.customs[name];
                    match resolver(name, &candidates) {
                        Some(v) => (v, None),
                        None => continue,
                    }
                }
                _ => {
                    let best = self.select(strategy, &candidates);
                    (best.value.clone(), Some(best.record))
                }
            };

            if self.config.include_audit {
                if let Some(w) = winner {
                    audit.push(FieldAudit {
                        field: name.to_string(),
                        record_id: w.id.clone(),
                        source: w.source.clone(),
                        strategy: strategy.as_str().to_string(),
                    });
                }
            }
            fields.insert(name.to_string(), value);
        }

        let golden = GoldenRecord {
            id: Uuid::new_v4(),
            provenance: cluster.members.clone(),
            fields,
            confidence: ConfidenceSummary {
                mean: cluster.mean_confidence,
                max: cluster.max_confidence,
            },
            audit,
        };
        debug!(
            golden = %golden.id,
            members = cluster.members.len(),
            fields = golden.fields.len(),
            "merged cluster into golden record"
        );
        Ok(golden)
    }

    /// Pick the winning candidate under a built-in strategy.
    fn select<'a, 'b>(
        &self,
        strategy: SurvivorshipStrategy,
        candidates: &'b [FieldCandidate<'a>],
    ) -> &'b FieldCandidate<'a> {
        let mut best = &candidates[0];
        for c in &candidates[1..] {
            if self.better(strategy, c, best) {
                best = c;
            }
        }
        best
    }

    /// Strict "is `a` better than `b`" under the given strategy.
    fn better(
        &self,
        strategy: SurvivorshipStrategy,
        a: &FieldCandidate<'_>,
        b: &FieldCandidate<'_>,
    ) -> bool {
        match strategy {
            SurvivorshipStrategy::MostRecent => {
                let fa = self.update_frequency(a);
                let fb = self.update_frequency(b);
                match fa.partial_cmp(&fb).unwrap_or(Ordering::Equal) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => match (a.record.updated_at, b.record.updated_at) {
                        (Some(ta), Some(tb)) if ta != tb => ta > tb,
                        (Some(_), None) => true,
                        _ => self.priority(a) < self.priority(b),
                    },
                }
            }
            SurvivorshipStrategy::MostComplete | SurvivorshipStrategy::Longest => {
                let (la, lb) = (a.value.as_text().len(), b.value.as_text().len());
                la > lb || (la == lb && a.trust > b.trust)
            }
            SurvivorshipStrategy::Shortest => {
                let (la, lb) = (a.value.as_text().len(), b.value.as_text().len());
                la < lb || (la == lb && a.trust > b.trust)
            }
            SurvivorshipStrategy::MostTrusted => {
                a.trust > b.trust || (a.trust == b.trust && self.priority(a) < self.priority(b))
            }
            // Custom never reaches selection.
            SurvivorshipStrategy::Custom => false,
        }
    }

    fn update_frequency(&self, c: &FieldCandidate<'_>) -> f64 {
        self.trust
            .source_update_frequency
            .get(c.record.source.as_str())
            .copied()
            .unwrap_or(0.0)
    }

    fn priority(&self, c: &FieldCandidate<'_>) -> usize {
        self.trust.priority_rank(c.record.source.as_str())
    }
}
