//! Two-phase batch matching over a read-only index snapshot.
//!
//! Phase 1 compares only pairs that share a blocking key on at least one
//! configured field. When phase 1 confirms fewer matches than the configured
//! fraction of the batch, phase 2 queries the similarity index for the
//! still-unmatched records and evaluates their candidates. A pair is never
//! evaluated twice across phases.
//!
//! Workers run on the rayon pool and share lock-free counters. Memory
//! pressure is sampled every N pairs; pressure that stays critical after a
//! reclaim attempt aborts the batch with [`EngineError::ResourceExhausted`],
//! the only batch-fatal condition. Deadline expiry and cancellation instead
//! stop matching and mark the output incomplete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use rayon::prelude::*;
use tracing::{info, warn};

use record_link_core::config::EngineConfig;
use record_link_core::types::{MatchResult, Record, RecordId};
use record_link_index::{BlockingKeyGenerator, SimilarityIndex};

use crate::error::{EngineError, EngineResult};
use crate::governor::{MemoryPressure, NoopGovernor, ResourceGovernor};
use crate::rules::MatchRuleEngine;
use crate::stats::{BatchCounters, BatchStats};

/// Match results plus the batch counters snapshot.
#[derive(Debug)]
pub struct MatchOutput {
    pub results: Vec<MatchResult>,
    pub stats: BatchStats,
}

pub struct BatchMatchOrchestrator<'a> {
    rules: &'a MatchRuleEngine,
    index: &'a SimilarityIndex,
    blocking: &'a BlockingKeyGenerator,
    governor: Arc<dyn ResourceGovernor>,
    phase2_trigger_ratio: f64,
    top_k: usize,
    timeout: Option<Duration>,
    cancel: Arc<AtomicBool>,
}

/// Shared per-run state for the matching workers.
struct RunState {
    counters: BatchCounters,
    /// Ordered id pairs already evaluated, across both phases.
    compared: DashSet<(RecordId, RecordId)>,
    resource_abort: AtomicBool,
    stopped: AtomicBool,
    deadline: Option<Instant>,
}

impl<'a> BatchMatchOrchestrator<'a> {
    pub fn new(
        rules: &'a MatchRuleEngine,
        index: &'a SimilarityIndex,
        blocking: &'a BlockingKeyGenerator,
        config: &EngineConfig,
    ) -> Self {
        Self {
            rules,
            index,
            blocking,
            governor: Arc::new(NoopGovernor),
            phase2_trigger_ratio: config.phase2_trigger_ratio,
            top_k: config.index.top_k,
            timeout: config.batch_timeout_ms.map(Duration::from_millis),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_governor(mut self, governor: Arc<dyn ResourceGovernor>) -> Self {
        self.governor = governor;
        self
    }

    /// Cooperative cancellation: setting the flag stops matching at the next
    /// pair boundary and marks the output incomplete.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn run(&self, records: &[Record]) -> EngineResult<MatchOutput> {
        let started = Instant::now();
        let state = RunState {
            counters: BatchCounters::default(),
            compared: DashSet::new(),
            resource_abort: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            deadline: self.timeout.map(|t| started + t),
        };

        let by_id: HashMap<&RecordId, &Record> =
            records.iter().map(|r| (&r.id, r)).collect();

        // Phase 1: blocked pairs only.
        let blocked = self.blocked_pairs(records);
        let phase1_pairs = blocked.len();
        let mut results: Vec<MatchResult> = blocked
            .into_par_iter()
            .filter_map(|(i, j)| {
                let (a, b) = (&records[i], &records[j]);
                state.compared.insert(ordered(&a.id, &b.id));
                self.evaluate(a, b, &state)
            })
            .collect();

        if state.resource_abort.load(Ordering::Relaxed) {
            return Err(EngineError::ResourceExhausted {
                pairs_compared: state.counters.pairs_compared.load(Ordering::Relaxed),
            });
        }

        // Phase 2: vector retrieval for the still-unmatched, when phase 1
        // yield is below the trigger ratio.
        let confirmed = state.counters.confirmed();
        let trigger = (records.len() as f64 * self.phase2_trigger_ratio).ceil() as u64;
        if confirmed < trigger && !state.stopped.load(Ordering::Relaxed) {
            state.counters.mark_phase2();
            info!(confirmed, trigger, "phase 1 yield low, running candidate retrieval");

            let matched: std::collections::HashSet<&RecordId> = results
                .iter()
                .filter(|r| r.match_type.is_confirmed())
                .flat_map(|r| [&r.id1, &r.id2])
                .collect();

            let phase2: Vec<MatchResult> = records
                .par_iter()
                .filter(|r| !matched.contains(&r.id))
                .flat_map_iter(|r| {
                    let candidates = match self.index.candidates(r, self.top_k, true) {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(record = %r.id, error = %e, "candidate query failed");
                            Vec::new()
                        }
                    };
                    candidates
                        .into_iter()
                        .filter_map(|c| {
                            let other = by_id.get(&c.id)?;
                            if !state.compared.insert(ordered(&r.id, &c.id)) {
                                return None;
                            }
                            self.evaluate(r, other, &state)
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            results.extend(phase2);
        }

        if state.resource_abort.load(Ordering::Relaxed) {
            return Err(EngineError::ResourceExhausted {
                pairs_compared: state.counters.pairs_compared.load(Ordering::Relaxed),
            });
        }

        let incomplete =
            state.stopped.load(Ordering::Relaxed) || self.cancel.load(Ordering::Relaxed);
        let stats = state.counters.snapshot(
            self.index.embedding_failures(),
            incomplete,
            started.elapsed().as_millis() as u64,
        );
        info!(
            records = records.len(),
            phase1_pairs,
            pairs_compared = stats.pairs_compared,
            confirmed = stats.confirmed_matches(),
            phase2_ran = stats.phase2_ran,
            incomplete,
            "batch matching finished"
        );
        Ok(MatchOutput { results, stats })
    }

    /// Index pairs sharing at least one per-field blocking key, deduplicated
    /// across fields. Records whose value is missing block together under
    /// the missing token rather than being dropped.
    fn blocked_pairs(&self, records: &[Record]) -> Vec<(usize, usize)> {
        let mut pairs = std::collections::BTreeSet::new();
        for field in self.blocking.fields() {
            let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, record) in records.iter().enumerate() {
                groups
                    .entry(self.blocking.key_for_field(record, field))
                    .or_default()
                    .push(i);
            }
            for members in groups.values() {
                for (a, &i) in members.iter().enumerate() {
                    for &j in &members[a + 1..] {
                        pairs.insert((i, j));
                    }
                }
            }
        }
        pairs.into_iter().collect()
    }

    fn evaluate(&self, a: &Record, b: &Record, state: &RunState) -> Option<MatchResult> {
        if state.resource_abort.load(Ordering::Relaxed) {
            return None;
        }
        if self.cancel.load(Ordering::Relaxed)
            || state.deadline.is_some_and(|d| Instant::now() >= d)
        {
            state.stopped.store(true, Ordering::Relaxed);
            return None;
        }

        let result = self.rules.match_pair(a, b, self.index);
        state.counters.record(result.match_type);

        let interval = self.governor.sample_interval();
        if interval != u64::MAX {
            let compared = state.counters.pairs_compared.load(Ordering::Relaxed);
            if compared % interval == 0 && self.governor.pressure() == MemoryPressure::Critical {
                self.governor.try_reclaim();
                if self.governor.pressure() == MemoryPressure::Critical {
                    warn!(compared, "memory pressure critical after reclaim, aborting batch");
                    state.resource_abort.store(true, Ordering::Relaxed);
                }
            }
        }

        Some(result)
    }
}

fn ordered(a: &RecordId, b: &RecordId) -> (RecordId, RecordId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
