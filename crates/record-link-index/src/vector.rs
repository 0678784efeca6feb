//! Vector similarity index over concatenated field embeddings.
//!
//! Wraps an `hnsw_rs` cosine index. Record ids map to the library's dense
//! usize ids in both directions; vectors are kept alongside so candidate
//! scores can be recomputed exactly when needed. The index belongs to one
//! batch: it is populated before matching starts and read-only afterwards.

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use record_link_core::config::HnswParams;
use record_link_core::types::{Candidate, RecordId};

use crate::error::{IndexError, IndexResult};

pub struct VectorIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    id_to_data: HashMap<RecordId, usize>,
    data_to_id: HashMap<usize, RecordId>,
    vectors: HashMap<RecordId, Vec<f32>>,
    dimension: usize,
    ef_search: usize,
    capacity: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize, params: &HnswParams) -> Self {
        let hnsw = Hnsw::<f32, DistCosine>::new(
            params.max_connections,
            params.max_elements,
            params.max_layer,
            params.ef_construction,
            DistCosine {},
        );
        Self {
            hnsw,
            id_to_data: HashMap::new(),
            data_to_id: HashMap::new(),
            vectors: HashMap::new(),
            dimension,
            ef_search: params.ef_search,
            capacity: params.max_elements,
        }
    }

    pub fn len(&self) -> usize {
        self.id_to_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_data.is_empty()
    }

    pub fn vector(&self, id: &RecordId) -> Option<&Vec<f32>> {
        self.vectors.get(id)
    }

    /// Add a record's vector. Zero-norm vectors (fully degraded embeddings)
    /// are skipped — they cannot participate in cosine search; returns
    /// whether the vector was actually indexed.
    pub fn add(&mut self, id: RecordId, vector: Vec<f32>) -> IndexResult<bool> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.id_to_data.len() >= self.capacity {
            return Err(IndexError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < f32::EPSILON {
            debug!(record = %id, "skipping zero-norm vector");
            return Ok(false);
        }

        let data_id = self.id_to_data.len();
        self.hnsw.insert_slice((&vector, data_id));
        self.id_to_data.insert(id.clone(), data_id);
        self.data_to_id.insert(data_id, id.clone());
        self.vectors.insert(id, vector);
        Ok(true)
    }

    /// Top-k most similar records above `floor`, best first. A zero-norm
    /// query returns nothing. The caller excludes self-hits.
    pub fn search(&self, query: &[f32], k: usize, floor: f32) -> IndexResult<Vec<Candidate>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let norm: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < f32::EPSILON {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let neighbours: Vec<Neighbour> = self.hnsw.search(query, k, ef);
        let mut out: Vec<Candidate> = neighbours
            .into_iter()
            .filter_map(|n| {
                let id = self.data_to_id.get(&n.d_id)?;
                // Cosine distance → similarity.
                let score = (1.0 - n.distance).clamp(0.0, 1.0);
                (score >= floor).then(|| Candidate {
                    id: id.clone(),
                    score,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish()
    }
}
