//! Blocking-key generation.
//!
//! Derives a coarse partition key per record so phase 1 never goes all-pairs.
//! Keys are deterministic for a record under stable configuration:
//!
//! - numeric fields bucket by order of magnitude (exponential binning), so
//!   block sizes stay balanced instead of one bucket per exact value
//! - string fields lowercase and reduce to the first whitespace-delimited
//!   token, truncated to three characters when longer
//! - dates bucket by year
//! - empty/null/sentinel values map to a fixed missing token so they block
//!   together rather than scattering
//!
//! Keys are cached per record identity in a bounded moka cache; eviction is
//! the cache's policy, explicit and testable in isolation.

use moka::sync::Cache;
use std::sync::Arc;
use tracing::debug;

use record_link_core::config::BlockingConfig;
use record_link_core::types::{FieldValue, Record, RecordId};

/// Fixed token that missing values block under.
pub const MISSING_KEY_TOKEN: &str = "__missing__";

/// Derives coarse partition keys from configured fields.
pub struct BlockingKeyGenerator {
    fields: Vec<String>,
    cache: Cache<RecordId, Arc<String>>,
}

impl BlockingKeyGenerator {
    pub fn new(config: &BlockingConfig) -> Self {
        debug!(fields = ?config.fields, capacity = config.cache_capacity, "blocking key generator ready");
        Self {
            fields: config.fields.clone(),
            cache: Cache::new(config.cache_capacity),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Composite key over all configured fields, '|'-joined. Cached by
    /// record identity.
    pub fn key(&self, record: &Record) -> Arc<String> {
        self.cache.get_with(record.id.clone(), || {
            let parts: Vec<String> = self
                .fields
                .iter()
                .map(|f| Self::field_key(record.field(f)))
                .collect();
            Arc::new(parts.join("|"))
        })
    }

    /// Key for one field of a record. Not cached; phase 1 groups on this.
    pub fn key_for_field(&self, record: &Record, field: &str) -> String {
        Self::field_key(record.field(field))
    }

    fn field_key(value: Option<&FieldValue>) -> String {
        let value = match value {
            Some(v) if !v.is_missing() => v,
            _ => return MISSING_KEY_TOKEN.to_string(),
        };
        match value {
            FieldValue::Text(s) => Self::string_key(s),
            FieldValue::Number(n) => Self::number_key(*n),
            FieldValue::Date(d) => format!("y{}", d.format("%Y")),
        }
    }

    /// First whitespace-delimited token, lowercased, truncated to three
    /// characters when longer.
    fn string_key(s: &str) -> String {
        let lowered = s.trim().to_lowercase();
        let token = lowered.split_whitespace().next().unwrap_or("");
        if token.is_empty() {
            return MISSING_KEY_TOKEN.to_string();
        }
        token.chars().take(3).collect()
    }

    /// Order-of-magnitude bucket: sign plus decimal exponent.
    fn number_key(n: f64) -> String {
        if n == 0.0 {
            return "n0".to_string();
        }
        let exp = n.abs().log10().floor() as i32;
        if n < 0.0 {
            format!("n-e{exp}")
        } else {
            format!("ne{exp}")
        }
    }
}
