//! Survivorship configuration: which value wins per field during merge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Strategy for choosing the winning value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorshipStrategy {
    /// Prefer the source with the highest configured update frequency,
    /// then the most recent record timestamp.
    MostRecent,
    /// Prefer the most populated value (longest text rendering).
    MostComplete,
    /// Prefer the value from the record with the highest trust score;
    /// ties broken by configured source priority.
    #[default]
    MostTrusted,
    Longest,
    Shortest,
    /// Delegate to a caller-supplied resolver registered on the
    /// `SurvivorshipResolver` for this field.
    Custom,
}

impl SurvivorshipStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurvivorshipStrategy::MostRecent => "most_recent",
            SurvivorshipStrategy::MostComplete => "most_complete",
            SurvivorshipStrategy::MostTrusted => "most_trusted",
            SurvivorshipStrategy::Longest => "longest",
            SurvivorshipStrategy::Shortest => "shortest",
            SurvivorshipStrategy::Custom => "custom",
        }
    }
}

/// Per-field strategy map with a default, plus audit switch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurvivorshipConfig {
    #[serde(default)]
    pub field_strategies: HashMap<String, SurvivorshipStrategy>,
    #[serde(default)]
    pub default_strategy: SurvivorshipStrategy,
    /// Emit per-field winning-source audit entries on golden records.
    #[serde(default)]
    pub include_audit: bool,
}

impl SurvivorshipConfig {
    pub fn strategy_for(&self, field: &str) -> SurvivorshipStrategy {
        self.field_strategies
            .get(field)
            .copied()
            .unwrap_or(self.default_strategy)
    }
}
