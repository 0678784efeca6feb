//! Domain types for the entity-resolution engine.

mod cluster;
mod golden;
mod match_result;
mod record;

pub use cluster::Cluster;
pub use golden::{ConfidenceSummary, FieldAudit, GoldenRecord, TrustScore};
pub use match_result::{Candidate, MatchResult, MatchType};
pub use record::{is_missing_text, FieldValue, Record, RecordId, SourceId};
