//! Entity clusters: transitive groups of confirmed matches.

use serde::{Deserialize, Serialize};

use super::record::RecordId;

/// A set of record ids transitively connected by confirmed match results.
///
/// Membership is the transitive closure of confirmed matches: two members
/// need not have been directly compared, and indirectly connected pairs are
/// not re-validated. Accepted behavior, documented as a correctness risk
/// for workloads that must support record un-linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Member record ids, sorted for deterministic output.
    pub members: Vec<RecordId>,
    /// Mean confidence of the confirmed results inside the cluster.
    pub mean_confidence: f64,
    /// Maximum confidence of the confirmed results inside the cluster.
    pub max_confidence: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.members.binary_search(id).is_ok()
    }
}
