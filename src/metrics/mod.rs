//! Metrics for partition resolution, splits, and the mapping cache.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    IndexMetrics                        │
//! │  lookups / ancestor_hops      (PartitionRouter)        │
//! │  splits_applied / aborted     (SplitTransaction)       │
//! │  merges / cache_hits / misses (MappingCache)           │
//! │  errors{kind}                                          │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gigaplus::metrics::IndexMetrics;
//!
//! let metrics = IndexMetrics::new();
//! metrics.record_lookup(2);
//! println!("{}", metrics.to_prometheus());
//! ```

mod counters;

pub use counters::{Counter, LabeledCounter};

use crate::error::Error;

/// Counters shared by the router and the mapping cache.
#[derive(Debug)]
pub struct IndexMetrics {
    /// Names resolved to a partition.
    pub lookups: Counter,
    /// Parent steps taken while resolving.
    pub ancestor_hops: Counter,
    /// Splits committed to a mapping.
    pub splits_applied: Counter,
    /// Splits rolled back.
    pub splits_aborted: Counter,
    /// Per-entry migration checks.
    pub migration_checks: Counter,
    /// Mapping updates merged into a cached copy.
    pub merges: Counter,
    /// Mapping cache hits.
    pub cache_hits: Counter,
    /// Mapping cache misses.
    pub cache_misses: Counter,
    /// Failed operations by error kind.
    pub errors: LabeledCounter,
}

impl Default for IndexMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self {
            lookups: Counter::new("giga_lookups_total", "Names resolved to a partition"),
            ancestor_hops: Counter::new(
                "giga_ancestor_hops_total",
                "Parent steps taken while resolving names",
            ),
            splits_applied: Counter::new("giga_splits_applied_total", "Splits committed"),
            splits_aborted: Counter::new("giga_splits_aborted_total", "Splits rolled back"),
            migration_checks: Counter::new(
                "giga_migration_checks_total",
                "Entries checked against a new partition",
            ),
            merges: Counter::new("giga_mapping_merges_total", "Mapping updates merged"),
            cache_hits: Counter::new("giga_cache_hits_total", "Mapping cache hits"),
            cache_misses: Counter::new("giga_cache_misses_total", "Mapping cache misses"),
            errors: LabeledCounter::new("giga_errors_total", "Failed operations", "kind"),
        }
    }

    /// Record one resolution that walked `hops` parents.
    pub fn record_lookup(&self, hops: u32) {
        self.lookups.inc();
        self.ancestor_hops.inc_by(u64::from(hops));
    }

    /// Record a failed operation.
    pub fn record_error(&self, error: &Error) {
        self.errors.inc(error.kind());
    }

    /// Take a point-in-time copy of all values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lookups: self.lookups.get(),
            ancestor_hops: self.ancestor_hops.get(),
            splits_applied: self.splits_applied.get(),
            splits_aborted: self.splits_aborted.get(),
            migration_checks: self.migration_checks.get(),
            merges: self.merges.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            errors: self.errors.total(),
        }
    }

    /// Format metrics in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        for counter in [
            &self.lookups,
            &self.ancestor_hops,
            &self.splits_applied,
            &self.splits_aborted,
            &self.migration_checks,
            &self.merges,
            &self.cache_hits,
            &self.cache_misses,
        ] {
            output.push_str(&format!(
                "# HELP {name} {}\n# TYPE {name} counter\n{name} {}\n",
                counter.help(),
                counter.get(),
                name = counter.name(),
            ));
        }

        output.push_str(&format!(
            "# HELP {name} {}\n# TYPE {name} counter\n",
            self.errors.help(),
            name = self.errors.name(),
        ));
        for (label, value) in self.errors.get_all() {
            output.push_str(&format!(
                "{}{{{}=\"{}\"}} {}\n",
                self.errors.name(),
                self.errors.label_name(),
                label,
                value
            ));
        }

        output
    }
}

/// Point-in-time copy of [`IndexMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lookups: u64,
    pub ancestor_hops: u64,
    pub splits_applied: u64,
    pub splits_aborted: u64,
    pub migration_checks: u64,
    pub merges: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Mean parent steps per lookup.
    pub fn avg_hops(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.ancestor_hops as f64 / self.lookups as f64
        }
    }

    /// Mapping cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
