//! Human-readable metrics formatter
//!
//! # Example Output
//!
//! ```text
//! [writer:main] period: 60s | rows: 1.2M (20.0K/s) | failed: 0 | calls: 2.4K | retries: 3 | throttle: 1.4s | batch: avg 500
//! ```

use super::{MetricsFormatter, format_count, format_millis, format_rate, rows_per_sec};
use crate::WriterMetricsSnapshot;

/// Human-readable metrics formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    /// Create a new human formatter
    pub fn new() -> Self {
        Self
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format_writer(
        &self,
        writer_id: &str,
        snapshot: &WriterMetricsSnapshot,
        previous: Option<&WriterMetricsSnapshot>,
        interval_secs: u64,
    ) -> String {
        format!(
            "[writer:{}] period: {}s | rows: {} ({}) | failed: {} | calls: {} | retries: {} | throttle: {} | batch: avg {:.0}",
            writer_id,
            interval_secs,
            format_count(snapshot.rows_written),
            format_rate(rows_per_sec(snapshot, previous, interval_secs)),
            snapshot.rows_failed,
            format_count(snapshot.insert_calls),
            snapshot.retries,
            format_millis(snapshot.throttle_ms),
            snapshot.batch_size.mean(),
        )
    }
}
