//! Metrics provider traits
//!
//! Writers implement `WriterMetricsProvider` so the reporter can collect
//! their metrics without knowing the concrete types.

use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of a `Distribution`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributionSnapshot {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl DistributionSnapshot {
    /// Arithmetic mean, 0 when empty
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Point-in-time snapshot of writer metrics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WriterMetricsSnapshot {
    /// Rows accepted into buffers
    pub rows_buffered: u64,
    /// Rows committed by the storage service
    pub rows_written: u64,
    /// Rows emitted as dead letters
    pub rows_failed: u64,
    /// Insert calls issued, retries included
    pub insert_calls: u64,
    /// Insert calls that failed at the transport level
    pub insert_errors: u64,
    /// Retry rounds after a partial failure
    pub retries: u64,
    /// Create-or-get calls issued
    pub tables_created: u64,
    /// Total time spent sleeping in backoff
    pub throttle_ms: u64,
    /// Rows per flush
    pub batch_size: DistributionSnapshot,
    /// Wall time per flush loop
    pub batch_latency_ms: DistributionSnapshot,
    /// Rows failing per insert attempt
    pub failed_rows_per_batch: DistributionSnapshot,
}

/// Reporting settings a provider asks for
#[derive(Debug, Clone, Copy)]
pub struct WriterMetricsConfig {
    /// Whether reporting is on
    pub enabled: bool,
    /// Time between reports
    pub interval: Duration,
}

impl Default for WriterMetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
        }
    }
}

/// Trait for writers to provide metrics to the reporter
pub trait WriterMetricsProvider: Send + Sync {
    /// Identifier used in report lines
    fn writer_id(&self) -> &str;

    /// Reporting settings
    fn metrics_config(&self) -> WriterMetricsConfig;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> WriterMetricsSnapshot;
}
