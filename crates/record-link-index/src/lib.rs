//! Candidate generation for the record-link engine.
//!
//! Two complementary retrieval paths, combined by [`SimilarityIndex`]:
//!
//! 1. **Signature buckets** — several independent hash signatures per field
//!    (whole value, sorted tokens, character-trigram minhash) indexed as
//!    (field, signature) → record ids. Within one rule candidates must agree
//!    on every field (AND); across rules the sets union (OR).
//! 2. **Vector similarity** — per-field embeddings concatenated into one
//!    normalized vector per record, indexed in HNSW (cosine), queried for
//!    the top-K above a similarity floor.
//!
//! Plus [`BlockingKeyGenerator`], the coarse partitioner used by phase 1 of
//! the batch orchestrator.
//!
//! The index is built once per batch and read-only afterwards; workers share
//! it freely during the matching phase.

pub mod blocking;
pub mod error;
pub mod signature;
pub mod similarity;
pub mod vector;

pub use blocking::{BlockingKeyGenerator, MISSING_KEY_TOKEN};
pub use error::{IndexError, IndexResult};
pub use signature::SignatureIndex;
pub use similarity::SimilarityIndex;
pub use vector::VectorIndex;
