//! Per-batch counters and the immutable stats snapshot they produce.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use record_link_core::types::MatchType;

/// Lock-free counters shared by matching workers.
#[derive(Debug, Default)]
pub(crate) struct BatchCounters {
    pub pairs_compared: AtomicU64,
    exact: AtomicU64,
    fuzzy: AtomicU64,
    potential: AtomicU64,
    no_match: AtomicU64,
    error: AtomicU64,
    phase2_ran: AtomicBool,
}

impl BatchCounters {
    pub fn record(&self, match_type: MatchType) {
        self.pairs_compared.fetch_add(1, Ordering::Relaxed);
        let counter = match match_type {
            MatchType::Exact => &self.exact,
            MatchType::Fuzzy => &self.fuzzy,
            MatchType::Potential => &self.potential,
            MatchType::NoMatch => &self.no_match,
            MatchType::Error => &self.error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn confirmed(&self) -> u64 {
        self.exact.load(Ordering::Relaxed)
            + self.fuzzy.load(Ordering::Relaxed)
            + self.potential.load(Ordering::Relaxed)
    }

    pub fn mark_phase2(&self) {
        self.phase2_ran.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self, embedding_failures: u64, incomplete: bool, elapsed_ms: u64) -> BatchStats {
        BatchStats {
            pairs_compared: self.pairs_compared.load(Ordering::Relaxed),
            exact_matches: self.exact.load(Ordering::Relaxed),
            fuzzy_matches: self.fuzzy.load(Ordering::Relaxed),
            potential_matches: self.potential.load(Ordering::Relaxed),
            no_matches: self.no_match.load(Ordering::Relaxed),
            errors: self.error.load(Ordering::Relaxed),
            embedding_failures,
            phase2_ran: self.phase2_ran.load(Ordering::Relaxed),
            incomplete,
            elapsed_ms,
        }
    }
}

/// What happened during one batch, for logs and callers' dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub pairs_compared: u64,
    pub exact_matches: u64,
    pub fuzzy_matches: u64,
    pub potential_matches: u64,
    pub no_matches: u64,
    pub errors: u64,
    /// Provider calls that degraded to zero vectors during index build.
    pub embedding_failures: u64,
    /// Whether low phase-1 yield triggered the vector-retrieval phase.
    pub phase2_ran: bool,
    /// Set when a deadline or cancellation stopped matching early; the
    /// results cover only the pairs compared before the stop.
    pub incomplete: bool,
    pub elapsed_ms: u64,
}

impl BatchStats {
    pub fn confirmed_matches(&self) -> u64 {
        self.exact_matches + self.fuzzy_matches + self.potential_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_roll_up_by_type() {
        let c = BatchCounters::default();
        c.record(MatchType::Exact);
        c.record(MatchType::Fuzzy);
        c.record(MatchType::Fuzzy);
        c.record(MatchType::NoMatch);
        c.record(MatchType::Error);

        let s = c.snapshot(3, false, 12);
        assert_eq!(s.pairs_compared, 5);
        assert_eq!(s.exact_matches, 1);
        assert_eq!(s.fuzzy_matches, 2);
        assert_eq!(s.no_matches, 1);
        assert_eq!(s.errors, 1);
        assert_eq!(s.embedding_failures, 3);
        assert_eq!(s.confirmed_matches(), 3);
        assert!(!s.phase2_ran);
    }
}
