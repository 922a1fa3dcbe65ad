//! The metrics sink the probes write into.

mod memory;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

pub use memory::MemoryAccumulator;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// The value as a Prometheus sample, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::String(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

/// One record handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub tags: Tags,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}

/// Append-only destination for probe records.
///
/// Records of one cycle may arrive from concurrently running probes.
pub trait Accumulator: Send + Sync {
    fn add_fields(&self, name: &str, tags: Tags, fields: Fields, timestamp: DateTime<Utc>);
}
