//! Record Link Core Library
//!
//! Domain types and batch-independent logic for the record-link
//! entity-resolution engine:
//!
//! - Domain types (`Record`, `MatchResult`, `Cluster`, `GoldenRecord`, ...)
//! - Validated configuration (`MatchRule`, `TrustConfig`, `EngineConfig`, ...)
//! - Field comparators (exact / fuzzy / embedding) as a closed enum
//! - Connected-component clustering over confirmed matches (union-find)
//! - Trust scoring and field-level survivorship
//!
//! Everything here is pure and synchronous. Candidate generation, embedding
//! providers and batch orchestration live in the sibling crates.

pub mod clustering;
pub mod comparators;
pub mod config;
pub mod error;
pub mod survivorship;
pub mod trust;
pub mod types;

// Re-exports for convenience
pub use clustering::ClusterBuilder;
pub use comparators::{Comparator, FuzzyMethod};
pub use config::{
    BlockingConfig, EngineConfig, FieldSpec, IndexConfig, MatchRule, SurvivorshipConfig,
    SurvivorshipStrategy, TrustConfig,
};
pub use error::{CoreError, CoreResult};
pub use survivorship::SurvivorshipResolver;
pub use trust::TrustScorer;
pub use types::{
    Candidate, Cluster, FieldValue, GoldenRecord, MatchResult, MatchType, Record, RecordId,
    SourceId, TrustScore,
};
