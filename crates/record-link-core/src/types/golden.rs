//! Golden records and trust scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{FieldValue, RecordId, SourceId};

/// Per-record trust score with its dimension breakdown.
///
/// All values are in [0, 1]. `overall` is the configured weighted
/// combination of the dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub overall: f64,
    /// Fraction of configured fields present.
    pub completeness: f64,
    /// Fraction of configured validators passing.
    pub accuracy: f64,
    /// Fraction of configured cross-field rules satisfied.
    pub consistency: f64,
    /// Exponential decay of record age against the configured half-life.
    pub timeliness: f64,
    /// Static per-source reliability weight.
    pub reliability: f64,
    /// Placeholder constant until a dataset-wide implementation exists.
    pub uniqueness: f64,
}

/// Aggregate confidence over a cluster's confirmed match results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub mean: f64,
    pub max: f64,
}

/// Which record contributed a golden field, and under which strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAudit {
    pub field: String,
    pub record_id: RecordId,
    pub source: SourceId,
    pub strategy: String,
}

/// The single merged representation of a cluster of matched records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenRecord {
    /// Generated identity; fresh per merge.
    pub id: Uuid,
    /// Ids of every source record in the cluster. Never empty.
    pub provenance: Vec<RecordId>,
    /// Merged field map, one winning value per field.
    pub fields: BTreeMap<String, FieldValue>,
    pub confidence: ConfidenceSummary,
    /// Per-field winning-source audit, when enabled in configuration.
    pub audit: Vec<FieldAudit>,
}
