//! Keyed metrics store
//!
//! Holds the latest (or accumulated) value snapshot per metric key. The
//! vocabulary is a small closed enum, so the map itself never grows past a
//! dozen entries; only append-only sequences can grow, and the routing layer
//! is responsible for capping how often it appends.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::signal::MetricKey;

#[derive(Debug, Default)]
pub struct MetricsStore {
    state: BTreeMap<MetricKey, Value>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self {
            state: BTreeMap::new(),
        }
    }

    /// Overwrite the current value for `key`.
    pub fn set(&mut self, key: MetricKey, value: Value) {
        self.state.insert(key, value);
    }

    /// Append `value` to the sequence stored at `key`, initializing an empty
    /// sequence if absent. A non-array current value is folded into the new
    /// sequence rather than lost.
    pub fn add(&mut self, key: MetricKey, value: Value) {
        match self.state.get_mut(&key) {
            Some(Value::Array(seq)) => seq.push(value),
            Some(existing) => {
                let prior = existing.take();
                *existing = Value::Array(vec![prior, value]);
            }
            None => {
                self.state.insert(key, Value::Array(vec![value]));
            }
        }
    }

    pub fn get(&self, key: MetricKey) -> Option<&Value> {
        self.state.get(&key)
    }

    pub fn has(&self, key: MetricKey) -> bool {
        self.state.contains_key(&key)
    }

    pub fn clear(&mut self) {
        self.state.clear();
    }

    /// Snapshot of every contained key mapped to its current value or
    /// sequence, keyed by wire name in stable key order. Used to build an
    /// outgoing metrics batch.
    pub fn snapshot(&self) -> serde_json::Map<String, Value> {
        self.state
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
