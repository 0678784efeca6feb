//! Record Link Engine
//!
//! The batch side of the entity-resolution pipeline:
//!
//! - [`MatchRuleEngine`]: ordered rule evaluation over record pairs
//! - [`BatchMatchOrchestrator`]: progressive two-phase blocking with a rayon
//!   worker pool over a read-only index snapshot
//! - [`ResourceGovernor`]: injectable memory-pressure policy; sustained
//!   pressure after a reclaim attempt is the one batch-fatal condition
//! - [`ResolutionEngine`]: end-to-end batch entry point producing match
//!   results, clusters and golden records
//!
//! Phase boundary invariant: clustering only runs once every match result
//! of the batch has been collected — connected components need the global
//! view. Index state is never mutated while matching runs.

pub mod error;
pub mod governor;
pub mod orchestrator;
pub mod pipeline;
pub mod rules;
pub mod stats;

pub use error::{EngineError, EngineResult};
pub use governor::{MemoryPressure, NoopGovernor, ResourceGovernor, ThresholdGovernor};
pub use orchestrator::{BatchMatchOrchestrator, MatchOutput};
pub use pipeline::{BatchOutcome, ResolutionEngine};
pub use rules::{FieldVectorSource, MatchRuleEngine};
pub use stats::BatchStats;
