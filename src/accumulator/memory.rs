use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{Accumulator, FieldValue, Fields, Metric, Tags};

/// Keeps every record in memory and answers questions about them.
///
/// Lookups by record name inspect the first matching record.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<Metric>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Metric>> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Metric> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn find<T>(&self, name: &str, f: impl FnOnce(&Metric) -> Option<T>) -> Option<T> {
        self.lock().iter().find(|m| m.name == name).and_then(f)
    }

    pub fn has_tag(&self, name: &str, key: &str) -> bool {
        self.tag_value(name, key).is_some()
    }

    pub fn tag_value(&self, name: &str, key: &str) -> Option<String> {
        self.find(name, |m| m.tags.get(key).cloned())
    }

    pub fn has_field(&self, name: &str, key: &str) -> bool {
        self.find(name, |m| m.fields.get(key).map(|_| ())).is_some()
    }

    pub fn int_field(&self, name: &str, key: &str) -> Option<i64> {
        self.find(name, |m| match m.fields.get(key) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        })
    }

    pub fn float_field(&self, name: &str, key: &str) -> Option<f64> {
        self.find(name, |m| match m.fields.get(key) {
            Some(FieldValue::Float(v)) => Some(*v),
            _ => None,
        })
    }

    pub fn string_field(&self, name: &str, key: &str) -> Option<String> {
        self.find(name, |m| match m.fields.get(key) {
            Some(FieldValue::String(v)) => Some(v.clone()),
            _ => None,
        })
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_fields(&self, name: &str, tags: Tags, fields: Fields, timestamp: DateTime<Utc>) {
        self.lock().push(Metric {
            name: name.to_string(),
            tags,
            fields,
            timestamp,
        });
    }
}
