//! Memory-pressure policy for batch matching.
//!
//! The orchestrator samples the governor every N pairs rather than per pair;
//! on [`MemoryPressure::Critical`] it asks for a reclaim and re-checks. Only
//! pressure that stays critical after the reclaim aborts the batch.
//!
//! The policy is a trait so deployments can wire in a real allocator or
//! cgroup probe, and tests can script pressure transitions.

use std::fmt;

use tracing::{debug, warn};

use record_link_core::config::GovernorConfig;

/// Observed memory state, coarsened to what the orchestrator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Normal,
    /// Above 80% of the threshold; logged, not acted on.
    Elevated,
    /// At or above the threshold; triggers reclaim and possibly abort.
    Critical,
}

pub trait ResourceGovernor: Send + Sync {
    /// How many pairs to compare between pressure samples.
    fn sample_interval(&self) -> u64;

    fn pressure(&self) -> MemoryPressure;

    /// Best-effort release of reclaimable memory (caches, scratch buffers).
    /// Called once when pressure goes critical, before the abort decision.
    fn try_reclaim(&self);
}

/// Governor that never reports pressure. The default when no byte threshold
/// is configured.
#[derive(Debug, Default)]
pub struct NoopGovernor;

impl ResourceGovernor for NoopGovernor {
    fn sample_interval(&self) -> u64 {
        u64::MAX
    }

    fn pressure(&self) -> MemoryPressure {
        MemoryPressure::Normal
    }

    fn try_reclaim(&self) {}
}

type UsageProbe = Box<dyn Fn() -> usize + Send + Sync>;
type ReclaimHook = Box<dyn Fn() + Send + Sync>;

/// Threshold governor over an injected usage probe.
///
/// The probe is a closure so the caller decides what "usage" means (RSS,
/// allocator stats, a cgroup limit); the reclaim hook typically invalidates
/// embedding caches.
pub struct ThresholdGovernor {
    threshold_bytes: usize,
    sample_interval: u64,
    probe: UsageProbe,
    reclaim: ReclaimHook,
}

impl ThresholdGovernor {
    pub fn new(config: &GovernorConfig, probe: UsageProbe) -> Self {
        Self {
            threshold_bytes: config.threshold_bytes,
            sample_interval: config.sample_interval_pairs,
            probe,
            reclaim: Box::new(|| {}),
        }
    }

    pub fn with_reclaim(mut self, reclaim: ReclaimHook) -> Self {
        self.reclaim = reclaim;
        self
    }
}

impl ResourceGovernor for ThresholdGovernor {
    fn sample_interval(&self) -> u64 {
        self.sample_interval.max(1)
    }

    fn pressure(&self) -> MemoryPressure {
        let usage = (self.probe)();
        if usage >= self.threshold_bytes {
            warn!(usage, threshold = self.threshold_bytes, "memory pressure critical");
            MemoryPressure::Critical
        } else if usage >= self.threshold_bytes / 5 * 4 {
            debug!(usage, threshold = self.threshold_bytes, "memory pressure elevated");
            MemoryPressure::Elevated
        } else {
            MemoryPressure::Normal
        }
    }

    fn try_reclaim(&self) {
        (self.reclaim)();
    }
}

impl fmt::Debug for ThresholdGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdGovernor")
            .field("threshold_bytes", &self.threshold_bytes)
            .field("sample_interval", &self.sample_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn threshold_bands() {
        let usage = Arc::new(AtomicUsize::new(0));
        let probe_usage = usage.clone();
        let config = GovernorConfig {
            threshold_bytes: 1000,
            sample_interval_pairs: 10,
        };
        let gov = ThresholdGovernor::new(
            &config,
            Box::new(move || probe_usage.load(Ordering::Relaxed)),
        );

        usage.store(100, Ordering::Relaxed);
        assert_eq!(gov.pressure(), MemoryPressure::Normal);
        usage.store(850, Ordering::Relaxed);
        assert_eq!(gov.pressure(), MemoryPressure::Elevated);
        usage.store(1000, Ordering::Relaxed);
        assert_eq!(gov.pressure(), MemoryPressure::Critical);
    }

    #[test]
    fn reclaim_hook_is_invoked() {
        let reclaimed = Arc::new(AtomicUsize::new(0));
        let hook_count = reclaimed.clone();
        let config = GovernorConfig {
            threshold_bytes: 1,
            sample_interval_pairs: 1,
        };
        let gov = ThresholdGovernor::new(&config, Box::new(|| 0))
            .with_reclaim(Box::new(move || {
                hook_count.fetch_add(1, Ordering::Relaxed);
            }));
        gov.try_reclaim();
        assert_eq!(reclaimed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn noop_never_pressures() {
        let gov = NoopGovernor;
        assert_eq!(gov.pressure(), MemoryPressure::Normal);
        assert_eq!(gov.sample_interval(), u64::MAX);
    }
}
