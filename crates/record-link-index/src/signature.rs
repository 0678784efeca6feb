//! Signature-bucket index for exact and near-exact recall.
//!
//! For every indexed field of a record we compute several independent
//! hash signatures:
//!
//! - whole normalized value under `signature_seeds` xxhash64 seeds
//! - sorted-token form (order-insensitive) under the same seeds
//! - character-trigram minhash under `minhash_permutations` permutations
//!
//! Records are bucketed by (field, signature). A query's candidates for one
//! rule are the intersection of per-field candidate sets (AND across the
//! rule's fields), unioned across rules (OR). False positives are fine —
//! the rule engine validates every candidate — false negatives only cost
//! recall that the vector path can recover.

use std::collections::HashSet;

use dashmap::DashMap;
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use record_link_core::types::{Record, RecordId};
use record_link_embeddings::batch::normalize_text;

/// Seed namespace for sorted-token signatures, kept away from the
/// whole-value seeds.
const TOKEN_SEED_BASE: u64 = 0x1000;
/// Seed namespace for minhash permutations.
const MINHASH_SEED_BASE: u64 = 0x2000;

/// (field, signature) → record ids. Populated at batch boundaries only;
/// read-only during matching.
pub struct SignatureIndex {
    signature_seeds: usize,
    minhash_permutations: usize,
    /// Field lists per rule; queries AND within a list, OR across lists.
    rule_fields: Vec<Vec<String>>,
    buckets: DashMap<(String, u64), HashSet<RecordId>>,
}

impl SignatureIndex {
    pub fn new(
        signature_seeds: usize,
        minhash_permutations: usize,
        rule_fields: Vec<Vec<String>>,
    ) -> Self {
        Self {
            signature_seeds,
            minhash_permutations,
            rule_fields,
            buckets: DashMap::new(),
        }
    }

    /// Every field referenced by any rule, deduplicated.
    fn indexed_fields(&self) -> HashSet<&str> {
        self.rule_fields
            .iter()
            .flat_map(|fs| fs.iter().map(String::as_str))
            .collect()
    }

    pub fn insert(&self, record: &Record) {
        for field in self.indexed_fields() {
            if let Some(value) = record.present(field) {
                for sig in self.signatures(&value.as_text()) {
                    self.buckets
                        .entry((field.to_string(), sig))
                        .or_default()
                        .insert(record.id.clone());
                }
            }
        }
    }

    /// Candidates for `record`: AND across each rule's fields, OR across
    /// rules. The record itself is excluded.
    pub fn query(&self, record: &Record) -> HashSet<RecordId> {
        let mut out: HashSet<RecordId> = HashSet::new();
        for fields in &self.rule_fields {
            if let Some(set) = self.query_rule(record, fields) {
                out.extend(set);
            }
        }
        out.remove(&record.id);
        out
    }

    /// Intersection of per-field candidate sets for one rule. `None` when
    /// the record has no signature for some field (no AND possible).
    fn query_rule(&self, record: &Record, fields: &[String]) -> Option<HashSet<RecordId>> {
        let mut acc: Option<HashSet<RecordId>> = None;
        for field in fields {
            let value = record.present(field)?;
            let mut field_set: HashSet<RecordId> = HashSet::new();
            for sig in self.signatures(&value.as_text()) {
                if let Some(bucket) = self.buckets.get(&(field.clone(), sig)) {
                    field_set.extend(bucket.iter().cloned());
                }
            }
            acc = Some(match acc {
                None => field_set,
                Some(prev) => prev.intersection(&field_set).cloned().collect(),
            });
            if acc.as_ref().is_some_and(HashSet::is_empty) {
                return acc;
            }
        }
        acc
    }

    /// All signatures of one value.
    fn signatures(&self, text: &str) -> Vec<u64> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        let mut sigs =
            Vec::with_capacity(2 * self.signature_seeds + self.minhash_permutations);

        for seed in 0..self.signature_seeds as u64 {
            sigs.push(xxh64(normalized.as_bytes(), seed));
        }

        let mut tokens: Vec<&str> = normalized.split(' ').collect();
        tokens.sort_unstable();
        let sorted = tokens.join(" ");
        for seed in 0..self.signature_seeds as u64 {
            sigs.push(xxh64(sorted.as_bytes(), TOKEN_SEED_BASE + seed));
        }

        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() >= 3 {
            for p in 0..self.minhash_permutations as u64 {
                let min = chars
                    .windows(3)
                    .map(|w| {
                        let gram: String = w.iter().collect();
                        xxh64(gram.as_bytes(), MINHASH_SEED_BASE + p)
                    })
                    .min()
                    .unwrap_or(0);
                // Namespace the permutation so buckets never cross.
                sigs.push(min.rotate_left(p as u32).wrapping_add(p));
            }
        }
        sigs
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for SignatureIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureIndex")
            .field("signature_seeds", &self.signature_seeds)
            .field("minhash_permutations", &self.minhash_permutations)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(rule_fields: Vec<Vec<&str>>) -> SignatureIndex {
        let fields = rule_fields
            .into_iter()
            .map(|fs| fs.into_iter().map(str::to_string).collect())
            .collect();
        SignatureIndex::new(4, 8, fields)
    }

    #[test]
    fn identical_values_land_in_same_buckets() {
        let idx = index(vec![vec!["ssn"]]);
        let a = Record::new("a", "x").with_field("ssn", "123-45-6789");
        let b = Record::new("b", "y").with_field("ssn", "123-45-6789");
        idx.insert(&a);
        idx.insert(&b);
        let candidates = idx.query(&a);
        assert!(candidates.contains(&RecordId::from("b")));
        assert!(!candidates.contains(&RecordId::from("a")), "self excluded");
    }

    #[test]
    fn token_order_is_ignored() {
        let idx = index(vec![vec!["name"]]);
        let a = Record::new("a", "x").with_field("name", "Doe John");
        let b = Record::new("b", "y").with_field("name", "John Doe");
        idx.insert(&a);
        idx.insert(&b);
        assert!(idx.query(&a).contains(&RecordId::from("b")));
    }

    #[test]
    fn near_duplicates_share_minhash_buckets() {
        let idx = index(vec![vec!["name"]]);
        let a = Record::new("a", "x").with_field("name", "Acme Corporation International");
        let b = Record::new("b", "y").with_field("name", "Acme Corporation Internationale");
        idx.insert(&a);
        idx.insert(&b);
        assert!(idx.query(&a).contains(&RecordId::from("b")));
    }

    #[test]
    fn rule_fields_intersect() {
        // One rule over (first, last): candidates must collide on both.
        let idx = index(vec![vec!["first", "last"]]);
        let a = Record::new("a", "x")
            .with_field("first", "John")
            .with_field("last", "Doe");
        let b = Record::new("b", "y")
            .with_field("first", "John")
            .with_field("last", "Doe");
        let c = Record::new("c", "z")
            .with_field("first", "John")
            .with_field("last", "Smithers-Quux");
        idx.insert(&a);
        idx.insert(&b);
        idx.insert(&c);
        let candidates = idx.query(&a);
        assert!(candidates.contains(&RecordId::from("b")));
        assert!(!candidates.contains(&RecordId::from("c")));
    }

    #[test]
    fn unrelated_values_do_not_collide() {
        let idx = index(vec![vec!["name"]]);
        let a = Record::new("a", "x").with_field("name", "Acme Corporation");
        let b = Record::new("b", "y").with_field("name", "Zenith Waterworks");
        idx.insert(&a);
        idx.insert(&b);
        assert!(idx.query(&a).is_empty());
    }

    #[test]
    fn missing_field_blocks_and_for_that_rule() {
        let idx = index(vec![vec!["first", "last"]]);
        let a = Record::new("a", "x").with_field("first", "John"); // no last
        let b = Record::new("b", "y")
            .with_field("first", "John")
            .with_field("last", "Doe");
        idx.insert(&a);
        idx.insert(&b);
        assert!(idx.query(&a).is_empty());
    }
}
