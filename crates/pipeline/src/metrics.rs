//! Pipeline dispatch metrics
//!
//! Counters for the dispatcher side of a run. Writer-side counters live in
//! `WriterMetrics` and are shared by every execution unit.

use std::sync::atomic::{AtomicU64, Ordering};

use tabwrite_metrics::Counter;

/// Metrics for the dispatcher and execution units
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Rows read from the input
    rows_received: Counter,

    /// Bundles handed to execution units
    bundles_dispatched: Counter,

    /// Pre-built batches emitted by the auto-sharding batcher
    batches_emitted: Counter,

    /// Shard groups skipped because they were already committed
    groups_skipped: Counter,

    /// Times a unit queue was full and the dispatcher had to wait
    queue_full_events: Counter,
}

impl PipelineMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            rows_received: Counter::new(),
            bundles_dispatched: Counter::new(),
            batches_emitted: Counter::new(),
            groups_skipped: Counter::new(),
            queue_full_events: Counter::new(),
        }
    }

    /// Record a row read from the input
    #[inline]
    pub fn record_received(&self) {
        self.rows_received.inc();
    }

    /// Record a bundle handed to a unit
    #[inline]
    pub fn record_dispatched(&self) {
        self.bundles_dispatched.inc();
    }

    /// Record a batch emitted by the auto-sharding batcher
    #[inline]
    pub fn record_batch_emitted(&self) {
        self.batches_emitted.inc();
    }

    /// Record a replayed shard group
    #[inline]
    pub fn record_group_skipped(&self) {
        self.groups_skipped.inc();
    }

    /// Record a full unit queue
    #[inline]
    pub fn record_queue_full(&self) {
        self.queue_full_events.inc();
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            rows_received: self.rows_received.get(),
            bundles_dispatched: self.bundles_dispatched.get(),
            batches_emitted: self.batches_emitted.get(),
            groups_skipped: self.groups_skipped.get(),
            queue_full_events: self.queue_full_events.get(),
        }
    }
}

/// Point-in-time snapshot of pipeline metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSnapshot {
    /// Rows read from the input
    pub rows_received: u64,
    /// Bundles handed to units
    pub bundles_dispatched: u64,
    /// Auto-sharding batches emitted
    pub batches_emitted: u64,
    /// Replayed shard groups skipped
    pub groups_skipped: u64,
    /// Full unit queue events
    pub queue_full_events: u64,
}

impl PipelineSnapshot {
    /// Calculate the difference from another snapshot
    pub fn diff(&self, previous: &PipelineSnapshot) -> PipelineSnapshot {
        PipelineSnapshot {
            rows_received: self.rows_received.saturating_sub(previous.rows_received),
            bundles_dispatched: self
                .bundles_dispatched
                .saturating_sub(previous.bundles_dispatched),
            batches_emitted: self.batches_emitted.saturating_sub(previous.batches_emitted),
            groups_skipped: self.groups_skipped.saturating_sub(previous.groups_skipped),
            queue_full_events: self
                .queue_full_events
                .saturating_sub(previous.queue_full_events),
        }
    }
}

// ============================================================================
// Queue Wait Tracker - Rate-limited logging of slow execution units
// ============================================================================

/// Rate-limited logging for full unit queues
///
/// The dispatcher waits whenever a unit queue is full, which is how
/// backend throttling propagates upstream. Waits are aggregated and
/// summarised once per second instead of logged one by one.
pub struct QueueWaitTracker {
    /// Waits in current interval
    interval_waits: AtomicU64,
    /// Rows held back in current interval
    interval_rows: AtomicU64,
    /// Last log time (epoch milliseconds)
    last_log_ms: AtomicU64,
}

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;
/// Waits per second above which the summary is logged at ERROR
const CRITICAL_WAIT_THRESHOLD: u64 = 100;

impl QueueWaitTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            interval_waits: AtomicU64::new(0),
            interval_rows: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(Self::now_ms()),
        }
    }

    /// Record a wait on a full queue and log a summary if one is due
    ///
    /// Returns true if a log was emitted.
    pub fn record_wait(&self, rows: u64) -> bool {
        self.interval_waits.fetch_add(1, Ordering::Relaxed);
        self.interval_rows.fetch_add(rows, Ordering::Relaxed);
        self.maybe_log()
    }

    fn maybe_log(&self) -> bool {
        let now = Self::now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);

        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return false;
        }

        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let waits = self.interval_waits.swap(0, Ordering::Relaxed);
        let rows = self.interval_rows.swap(0, Ordering::Relaxed);

        if waits == 0 {
            return false;
        }

        if waits > CRITICAL_WAIT_THRESHOLD {
            tracing::error!(
                waits,
                rows,
                threshold = CRITICAL_WAIT_THRESHOLD,
                "execution units cannot keep up with the input"
            );
        } else {
            tracing::warn!(waits, rows, "dispatcher waited on full unit queues in last second");
        }

        true
    }

    #[inline]
    fn now_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Waits recorded in the current interval
    #[cfg(test)]
    pub fn current_waits(&self) -> u64 {
        self.interval_waits.load(Ordering::Relaxed)
    }
}

impl Default for QueueWaitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueueWaitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueWaitTracker")
            .field("interval_waits", &self.interval_waits.load(Ordering::Relaxed))
            .field("interval_rows", &self.interval_rows.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_diff() {
        let metrics = PipelineMetrics::new();
        metrics.record_received();
        metrics.record_received();
        metrics.record_dispatched();
        let first = metrics.snapshot();

        metrics.record_received();
        metrics.record_group_skipped();
        metrics.record_queue_full();
        let second = metrics.snapshot();

        assert_eq!(second.rows_received, 3);
        let diff = second.diff(&first);
        assert_eq!(diff.rows_received, 1);
        assert_eq!(diff.bundles_dispatched, 0);
        assert_eq!(diff.groups_skipped, 1);
        assert_eq!(diff.queue_full_events, 1);
    }

    #[test]
    fn test_diff_saturates() {
        let newer = PipelineSnapshot::default();
        let older = PipelineSnapshot {
            rows_received: 5,
            ..Default::default()
        };
        assert_eq!(newer.diff(&older).rows_received, 0);
    }

    #[test]
    fn test_tracker_accumulates_within_interval() {
        let tracker = QueueWaitTracker::new();
        assert!(!tracker.record_wait(10));
        assert!(!tracker.record_wait(5));
        assert_eq!(tracker.current_waits(), 2);
    }

    #[test]
    fn test_tracker_logs_after_interval() {
        let tracker = QueueWaitTracker::new();
        tracker
            .last_log_ms
            .store(QueueWaitTracker::now_ms() - LOG_INTERVAL_MS - 1, Ordering::Relaxed);
        assert!(tracker.record_wait(1));
        assert_eq!(tracker.current_waits(), 0);
    }
}
