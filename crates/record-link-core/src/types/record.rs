//! Source records as consumed by the engine.
//!
//! A [`Record`] is an immutable snapshot handed in by an upstream connector:
//! an identity, a source-system tag, an ordered field map and an optional
//! last-updated timestamp. The engine never mutates records; everything it
//! produces (match results, clusters, golden records) is derived data.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Values that stand in for "no value" in noisy source data.
///
/// Compared case-insensitively after trimming.
const MISSING_SENTINELS: [&str; 3] = ["null", "na", "n/a"];

/// True for text that carries no information: empty or a missing sentinel.
pub fn is_missing_text(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || MISSING_SENTINELS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

/// Strongly typed identifier for source records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Strongly typed identifier for source systems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A heterogeneous field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl FieldValue {
    /// True when the value carries no information: empty or sentinel text.
    ///
    /// Numbers and dates are never missing; absence of the field itself
    /// models a missing numeric/date value.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Text(s) => is_missing_text(s),
            FieldValue::Number(_) | FieldValue::Date(_) => false,
        }
    }

    /// Canonical text rendering used by comparators and survivorship.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

/// A single source record. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the batch.
    pub id: RecordId,
    /// Source system this record came from.
    pub source: SourceId,
    /// Ordered field map. BTreeMap keeps iteration deterministic.
    pub fields: BTreeMap<String, FieldValue>,
    /// When the source last updated this record, if known.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            source: SourceId::new(source),
            fields: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_updated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.updated_at = Some(ts);
        self
    }

    /// Raw field lookup, missing sentinels included.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field lookup that treats sentinel values as absent.
    pub fn present(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_missing())
    }
}
