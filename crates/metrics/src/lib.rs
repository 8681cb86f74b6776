//! tabwrite Metrics
//!
//! Internal metrics collection and reporting for the write path.
//!
//! # Overview
//!
//! This crate provides:
//! - Atomic `Counter` and `Distribution` primitives
//! - The `WriterMetricsProvider` trait and its snapshot type
//! - A periodic reporter with human or JSON output
//!
//! # Metrics Handle Pattern
//!
//! Writers keep their metrics in an `Arc` and hand out a lightweight handle
//! implementing `WriterMetricsProvider`. The handle stays valid after the
//! pipeline that owns the writers has been consumed by `run()`.
//!
//! ```text
//! Pipeline (owns Arc<WriterMetrics>)
//!     │
//!     ├──► metrics_handle() → Handle (clones Arc, implements provider)
//!     │
//!     └──► run() [consumes self, Arc keeps metrics alive]
//! ```

pub mod format;
mod reporter;
mod traits;

pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter};
pub use reporter::{MetricsReporter, spawn_reporter};
pub use traits::{
    DistributionSnapshot, WriterMetricsConfig, WriterMetricsProvider, WriterMetricsSnapshot,
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset the counter to 0 and return the previous value
    #[inline]
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Count, sum, min and max of recorded values
///
/// Each field is updated independently, so a snapshot taken during a
/// concurrent `record` may be off by one sample.
#[derive(Debug)]
pub struct Distribution {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for Distribution {
    fn default() -> Self {
        Self::new()
    }
}

impl Distribution {
    /// Create an empty distribution
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    /// Record one sample
    #[inline]
    pub fn record(&self, value: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    pub fn snapshot(&self) -> DistributionSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        DistributionSnapshot {
            count,
            sum: self.sum.load(Ordering::Relaxed),
            min: if count == 0 {
                0
            } else {
                self.min.load(Ordering::Relaxed)
            },
            max: self.max.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.take(), 5);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_distribution() {
        let dist = Distribution::new();
        assert_eq!(dist.snapshot(), DistributionSnapshot::default());

        dist.record(5);
        dist.record(1);
        dist.record(9);

        let snap = dist.snapshot();
        assert_eq!(snap.count, 3);
        assert_eq!(snap.sum, 15);
        assert_eq!(snap.min, 1);
        assert_eq!(snap.max, 9);
        assert_eq!(snap.mean(), 5.0);
    }
}
