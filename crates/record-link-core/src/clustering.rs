//! Connected-component clustering over confirmed match results.
//!
//! Uses a disjoint-set (union-find) structure with path compression and
//! union by rank: near-linear in the number of confirmed results, with no
//! general graph machinery. Cluster membership is the transitive closure of
//! confirmed matches; indirectly connected pairs are not re-validated.
//!
//! Output ordering is deterministic (members sorted within a cluster,
//! clusters sorted by first member), which makes the operation idempotent:
//! re-running on an unchanged result set yields identical clusters.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{Cluster, MatchResult, RecordId};

/// Disjoint-set forest with path compression and union by rank.
#[derive(Debug)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Root of `x`, compressing the path walked.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Union by rank. Returns false when already in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Builds entity clusters from a batch's match results.
#[derive(Debug, Default)]
pub struct ClusterBuilder;

impl ClusterBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Connected components of the confirmed-match graph.
    ///
    /// Only confirmed results (EXACT/FUZZY/POTENTIAL) contribute nodes and
    /// edges; NO_MATCH and ERROR results are ignored entirely, so a record
    /// that never matched does not appear in any cluster.
    pub fn build(&self, results: &[MatchResult]) -> Vec<Cluster> {
        let confirmed: Vec<&MatchResult> = results
            .iter()
            .filter(|r| r.match_type.is_confirmed())
            .collect();

        // Node table over the ids that appear in confirmed results.
        let mut index: HashMap<&RecordId, usize> = HashMap::new();
        let mut ids: Vec<&RecordId> = Vec::new();
        for r in &confirmed {
            for id in [&r.id1, &r.id2] {
                if !index.contains_key(id) {
                    index.insert(id, ids.len());
                    ids.push(id);
                }
            }
        }

        let mut dsu = DisjointSet::new(ids.len());
        for r in &confirmed {
            dsu.union(index[&r.id1], index[&r.id2]);
        }

        // Group members and confidence stats by root.
        let mut members: HashMap<usize, Vec<RecordId>> = HashMap::new();
        for (i, id) in ids.iter().enumerate() {
            members.entry(dsu.find(i)).or_default().push((*id).clone());
        }
        let mut stats: HashMap<usize, (f64, f64, usize)> = HashMap::new();
        for r in &confirmed {
            let root = dsu.find(index[&r.id1]);
            let e = stats.entry(root).or_insert((0.0, 0.0, 0));
            e.0 += r.confidence;
            e.1 = e.1.max(r.confidence);
            e.2 += 1;
        }

        let mut clusters: Vec<Cluster> = members
            .into_iter()
            .map(|(root, mut ids)| {
                ids.sort();
                let (sum, max, n) = stats.get(&root).copied().unwrap_or((0.0, 0.0, 0));
                Cluster {
                    members: ids,
                    mean_confidence: if n > 0 { sum / n as f64 } else { 0.0 },
                    max_confidence: max,
                }
            })
            .collect();
        clusters.sort_by(|a, b| a.members[0].cmp(&b.members[0]));

        debug!(
            clusters = clusters.len(),
            confirmed = confirmed.len(),
            "built clusters from confirmed matches"
        );
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchResult, MatchType};

    fn result(a: &str, b: &str, t: MatchType, c: f64) -> MatchResult {
        MatchResult {
            id1: RecordId::from(a),
            id2: RecordId::from(b),
            match_type: t,
            confidence: c,
            rule_id: Some("r".to_string()),
        }
    }

    #[test]
    fn transitive_closure_groups_indirect_pairs() {
        // A-B and B-C confirmed; A and C never compared directly.
        let results = vec![
            result("a", "b", MatchType::Exact, 1.0),
            result("b", "c", MatchType::Fuzzy, 0.9),
        ];
        let clusters = ClusterBuilder::new().build(&results);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
        assert!((clusters[0].mean_confidence - 0.95).abs() < 1e-12);
        assert_eq!(clusters[0].max_confidence, 1.0);
    }

    #[test]
    fn no_match_and_error_excluded() {
        let results = vec![
            result("a", "b", MatchType::NoMatch, 0.0),
            result("c", "d", MatchType::Error, 0.0),
            result("e", "f", MatchType::Potential, 0.5),
        ];
        let clusters = ClusterBuilder::new().build(&results);
        assert_eq!(clusters.len(), 1);
        assert_eq!(
            clusters[0].members,
            vec![RecordId::from("e"), RecordId::from("f")]
        );
    }

    #[test]
    fn clustering_is_idempotent() {
        let results = vec![
            result("d", "a", MatchType::Fuzzy, 0.8),
            result("b", "c", MatchType::Exact, 1.0),
            result("a", "b", MatchType::Potential, 0.6),
            result("x", "y", MatchType::Fuzzy, 0.85),
        ];
        let first = ClusterBuilder::new().build(&results);
        let second = ClusterBuilder::new().build(&results);
        assert_eq!(first, second);
    }

    #[test]
    fn disjoint_set_unions() {
        let mut dsu = DisjointSet::new(4);
        assert!(dsu.union(0, 1));
        assert!(!dsu.union(1, 0));
        assert!(dsu.union(2, 3));
        assert_ne!(dsu.find(0), dsu.find(2));
        assert!(dsu.union(1, 3));
        assert_eq!(dsu.find(0), dsu.find(2));
    }
}
