//! Combined candidate retrieval: signature buckets + vector similarity.
//!
//! Built once per batch from the records, the rule set and a batch embedder;
//! read-only afterwards, so matching workers can share it without locks.
//! Falls back to vector search alone when signature recall is insufficient
//! or signatures are disabled for the query.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use record_link_core::comparators::cosine_similarity;
use record_link_core::config::{IndexConfig, MatchRule};
use record_link_core::types::{Candidate, Record, RecordId};
use record_link_embeddings::batch::{BatchEmbedder, EmbeddedBatch};

use crate::error::{IndexError, IndexResult};
use crate::signature::SignatureIndex;
use crate::vector::VectorIndex;

pub struct SimilarityIndex {
    signature: SignatureIndex,
    vector: VectorIndex,
    embedded: EmbeddedBatch,
    /// Field order for vector concatenation; sorted for determinism.
    embed_fields: Vec<String>,
    /// Concatenated normalized vector per record, zero-norm ones included.
    record_vectors: HashMap<RecordId, Vec<f32>>,
    top_k: usize,
    similarity_floor: f32,
}

impl SimilarityIndex {
    /// Embeds every rule-referenced field of every record, then populates
    /// both retrieval paths. This is the only write path; everything after
    /// construction is a read.
    pub async fn build(
        records: &[Record],
        rules: &[MatchRule],
        embedder: &BatchEmbedder,
        config: &IndexConfig,
    ) -> IndexResult<Self> {
        let rule_fields: Vec<Vec<String>> = rules
            .iter()
            .map(|r| r.fields().iter().map(|f| f.name.clone()).collect())
            .collect();
        let embed_fields: Vec<String> = rule_fields
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let embedded = embedder.embed_fields(records, &embed_fields).await;
        if embedded.dimension != config.dimension {
            return Err(IndexError::ConstructionFailed {
                message: format!(
                    "provider dimension {} does not match configured index dimension {}",
                    embedded.dimension, config.dimension
                ),
            });
        }

        let signature = SignatureIndex::new(
            config.signature_seeds,
            config.minhash_permutations,
            rule_fields,
        );
        let concat_dim = embed_fields.len().max(1) * config.dimension;
        let mut vector = VectorIndex::new(
            concat_dim,
            &config.hnsw,
        );

        let mut record_vectors = HashMap::with_capacity(records.len());
        for record in records {
            signature.insert(record);
            let v = Self::concatenate(&embedded, &embed_fields, record, concat_dim);
            vector.add(record.id.clone(), v.clone())?;
            record_vectors.insert(record.id.clone(), v);
        }

        info!(
            records = records.len(),
            buckets = signature.bucket_count(),
            indexed_vectors = vector.len(),
            "similarity index built"
        );

        Ok(Self {
            signature,
            vector,
            embedded,
            embed_fields,
            record_vectors,
            top_k: config.top_k,
            similarity_floor: config.similarity_floor,
        })
    }

    /// Per-field embedding, for the rule engine's embedding comparator.
    pub fn field_vector(&self, id: &RecordId, field: &str) -> Option<&[f32]> {
        self.embedded.get(id, field).map(|v| v.as_slice())
    }

    /// Provider calls that degraded to zero vectors during the build.
    pub fn embedding_failures(&self) -> u64 {
        self.embedded.failures
    }

    /// Ranked candidates for a record: deduplicated, self excluded, best
    /// first, at most `k`.
    ///
    /// Signature candidates come first (scored by concatenated-vector cosine
    /// when available); when they are insufficient or disabled, the vector
    /// path fills the remainder.
    pub fn candidates(
        &self,
        record: &Record,
        k: usize,
        use_signatures: bool,
    ) -> IndexResult<Vec<Candidate>> {
        let k = if k == 0 { self.top_k } else { k };
        let query_vec = self.record_vectors.get(&record.id);

        let mut best: HashMap<RecordId, f32> = HashMap::new();

        if use_signatures {
            for id in self.signature.query(record) {
                let score = match (query_vec, self.record_vectors.get(&id)) {
                    (Some(q), Some(c)) => {
                        let s = cosine_similarity(q, c) as f32;
                        // A signature collision is near-exact evidence even
                        // when embeddings degraded to zero.
                        if s > 0.0 {
                            s
                        } else {
                            1.0
                        }
                    }
                    _ => 1.0,
                };
                best.insert(id, score);
            }
        }

        if !use_signatures || best.len() < k {
            if let Some(q) = query_vec {
                for c in self.vector.search(q, k + 1, self.similarity_floor)? {
                    if c.id == record.id {
                        continue;
                    }
                    let entry = best.entry(c.id).or_insert(c.score);
                    if c.score > *entry {
                        *entry = c.score;
                    }
                }
            }
        }

        let mut out: Vec<Candidate> = best
            .into_iter()
            .map(|(id, score)| Candidate { id, score })
            .collect();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out.truncate(k);

        debug!(record = %record.id, candidates = out.len(), "candidate query");
        Ok(out)
    }

    pub fn embed_fields(&self) -> &[String] {
        &self.embed_fields
    }

    fn concatenate(
        embedded: &EmbeddedBatch,
        fields: &[String],
        record: &Record,
        concat_dim: usize,
    ) -> Vec<f32> {
        let mut v = Vec::with_capacity(concat_dim);
        for field in fields {
            match embedded.get(&record.id, field) {
                Some(part) => v.extend_from_slice(part),
                None => v.extend(std::iter::repeat(0.0).take(embedded.dimension)),
            }
        }
        v.resize(concat_dim, 0.0);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}
