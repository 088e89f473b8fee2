//! Counter metrics for monotonically increasing values.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the counter help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount.
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A counter split by one static label (e.g. error kind).
#[derive(Debug)]
pub struct LabeledCounter {
    name: &'static str,
    help: &'static str,
    label_name: &'static str,
    counters: RwLock<BTreeMap<&'static str, AtomicU64>>,
}

impl LabeledCounter {
    /// Create a new labeled counter.
    pub fn new(name: &'static str, help: &'static str, label_name: &'static str) -> Self {
        Self {
            name,
            help,
            label_name,
            counters: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the counter help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Get the label name.
    pub fn label_name(&self) -> &'static str {
        self.label_name
    }

    /// Increment the counter for `label`.
    pub fn inc(&self, label: &'static str) {
        {
            let counters = self.counters.read();
            if let Some(counter) = counters.get(label) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        self.counters
            .write()
            .entry(label)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get the value for `label`.
    pub fn get(&self, label: &str) -> u64 {
        self.counters
            .read()
            .get(label)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All label values with their counts, ordered by label.
    pub fn get_all(&self) -> Vec<(&'static str, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (*k, v.load(Ordering::Relaxed)))
            .collect()
    }

    /// Sum over all labels.
    pub fn total(&self) -> u64 {
        self.counters
            .read()
            .values()
            .map(|v| v.load(Ordering::Relaxed))
            .sum()
    }
}
