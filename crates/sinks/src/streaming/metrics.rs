//! Streaming writer metrics
//!
//! Counters and distributions shared by every writer of a pipeline.

use std::sync::Arc;
use std::time::Duration;

use tabwrite_metrics::{
    Counter, Distribution, WriterMetricsConfig, WriterMetricsProvider, WriterMetricsSnapshot,
};

// =============================================================================
// Metrics
// =============================================================================

/// Metrics for streaming-insert writers
#[derive(Debug, Default)]
pub struct WriterMetrics {
    /// Rows accepted into buffers
    pub rows_buffered: Counter,

    /// Rows committed
    pub rows_written: Counter,

    /// Rows dead-lettered
    pub rows_failed: Counter,

    /// Insert calls issued
    pub insert_calls: Counter,

    /// Insert calls failing at the transport level
    pub insert_errors: Counter,

    /// Retry rounds
    pub retries: Counter,

    /// Create-or-get calls issued
    pub tables_created: Counter,

    /// Cumulative backoff sleep
    pub throttle_ms: Counter,

    /// Rows per flush
    pub batch_size: Distribution,

    /// Flush loop wall time
    pub batch_latency_ms: Distribution,

    /// Rows failing per insert attempt
    pub failed_rows_per_batch: Distribution,
}

impl WriterMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            rows_buffered: Counter::new(),
            rows_written: Counter::new(),
            rows_failed: Counter::new(),
            insert_calls: Counter::new(),
            insert_errors: Counter::new(),
            retries: Counter::new(),
            tables_created: Counter::new(),
            throttle_ms: Counter::new(),
            batch_size: Distribution::new(),
            batch_latency_ms: Distribution::new(),
            failed_rows_per_batch: Distribution::new(),
        }
    }

    /// Record rows entering the buffers
    #[inline]
    pub fn record_buffered(&self, rows: u64) {
        self.rows_buffered.add(rows);
    }

    /// Record one insert call
    #[inline]
    pub fn record_insert_call(&self) {
        self.insert_calls.inc();
    }

    /// Record an insert call that failed outright
    #[inline]
    pub fn record_insert_error(&self) {
        self.insert_errors.inc();
    }

    /// Record the rows rejected by one attempt
    #[inline]
    pub fn record_failed_attempt(&self, rows: u64) {
        self.failed_rows_per_batch.record(rows);
    }

    /// Record a retry round and the backoff sleep before it
    #[inline]
    pub fn record_retry(&self, delay: Duration) {
        self.retries.inc();
        self.throttle_ms.add(delay.as_millis() as u64);
    }

    /// Record a create-or-get call
    #[inline]
    pub fn record_table_created(&self) {
        self.tables_created.inc();
    }

    /// Record the outcome of one flush loop
    #[inline]
    pub fn record_flush(&self, batch_rows: u64, written: u64, failed: u64, latency: Duration) {
        self.batch_size.record(batch_rows);
        self.batch_latency_ms.record(latency.as_millis() as u64);
        self.rows_written.add(written);
        self.rows_failed.add(failed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> WriterMetricsSnapshot {
        WriterMetricsSnapshot {
            rows_buffered: self.rows_buffered.get(),
            rows_written: self.rows_written.get(),
            rows_failed: self.rows_failed.get(),
            insert_calls: self.insert_calls.get(),
            insert_errors: self.insert_errors.get(),
            retries: self.retries.get(),
            tables_created: self.tables_created.get(),
            throttle_ms: self.throttle_ms.get(),
            batch_size: self.batch_size.snapshot(),
            batch_latency_ms: self.batch_latency_ms.snapshot(),
            failed_rows_per_batch: self.failed_rows_per_batch.snapshot(),
        }
    }
}

// =============================================================================
// Metrics Handle
// =============================================================================

/// Handle for reporting writer metrics
///
/// Holds an Arc to the metrics, so it remains valid after the writers are
/// consumed.
#[derive(Clone)]
pub struct WriterMetricsHandle {
    id: String,
    metrics: Arc<WriterMetrics>,
    config: WriterMetricsConfig,
}

impl WriterMetricsHandle {
    /// Create a new metrics handle
    pub fn new(
        id: impl Into<String>,
        metrics: Arc<WriterMetrics>,
        config: WriterMetricsConfig,
    ) -> Self {
        Self {
            id: id.into(),
            metrics,
            config,
        }
    }
}

impl WriterMetricsProvider for WriterMetricsHandle {
    fn writer_id(&self) -> &str {
        &self.id
    }

    fn metrics_config(&self) -> WriterMetricsConfig {
        self.config
    }

    fn snapshot(&self) -> WriterMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_flush() {
        let metrics = WriterMetrics::new();
        metrics.record_buffered(3);
        metrics.record_insert_call();
        metrics.record_flush(3, 2, 1, Duration::from_millis(12));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rows_buffered, 3);
        assert_eq!(snapshot.rows_written, 2);
        assert_eq!(snapshot.rows_failed, 1);
        assert_eq!(snapshot.batch_size.max, 3);
        assert_eq!(snapshot.batch_latency_ms.sum, 12);
    }

    #[test]
    fn test_record_retry_accumulates_throttle() {
        let metrics = WriterMetrics::new();
        metrics.record_retry(Duration::from_millis(150));
        metrics.record_retry(Duration::from_millis(300));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.throttle_ms, 450);
    }

    #[test]
    fn test_handle_shares_metrics() {
        let metrics = Arc::new(WriterMetrics::new());
        let handle =
            WriterMetricsHandle::new("main", Arc::clone(&metrics), WriterMetricsConfig::default());
        metrics.record_table_created();
        assert_eq!(handle.writer_id(), "main");
        assert_eq!(handle.snapshot().tables_created, 1);
    }
}
