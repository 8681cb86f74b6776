//! Metrics output formatters
//!
//! Formats writer metrics for human-readable or JSON output.

mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use crate::WriterMetricsSnapshot;

/// Trait for metrics formatters
pub trait MetricsFormatter: Send + Sync {
    /// Format one writer report
    ///
    /// `previous` is the snapshot from the last report, used for rates.
    fn format_writer(
        &self,
        writer_id: &str,
        snapshot: &WriterMetricsSnapshot,
        previous: Option<&WriterMetricsSnapshot>,
        interval_secs: u64,
    ) -> String;
}

/// Rows per second between two snapshots
pub fn rows_per_sec(
    snapshot: &WriterMetricsSnapshot,
    previous: Option<&WriterMetricsSnapshot>,
    interval_secs: u64,
) -> f64 {
    if interval_secs == 0 {
        return 0.0;
    }
    let before = previous.map(|p| p.rows_written).unwrap_or(0);
    snapshot.rows_written.saturating_sub(before) as f64 / interval_secs as f64
}

/// Format count with K/M suffix for readability
pub fn format_count(count: u64) -> String {
    const K: u64 = 1000;
    const M: u64 = 1_000_000;

    if count >= M {
        format!("{:.1}M", count as f64 / M as f64)
    } else if count >= K {
        format!("{:.1}K", count as f64 / K as f64)
    } else {
        count.to_string()
    }
}

/// Format rate per second with K/M suffix
pub fn format_rate(rate: f64) -> String {
    const K: f64 = 1000.0;
    const M: f64 = 1_000_000.0;

    if rate >= M {
        format!("{:.1}M/s", rate / M)
    } else if rate >= K {
        format!("{:.1}K/s", rate / K)
    } else {
        format!("{:.0}/s", rate)
    }
}

/// Format milliseconds as ms, s or m
pub fn format_millis(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{:.1}m", ms as f64 / 60_000.0)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(500), "500");
        assert_eq!(format_count(1000), "1.0K");
        assert_eq!(format_count(1500), "1.5K");
        assert_eq!(format_count(1_000_000), "1.0M");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(500.0), "500/s");
        assert_eq!(format_rate(1000.0), "1.0K/s");
        assert_eq!(format_rate(1_200_000.0), "1.2M/s");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(250), "250ms");
        assert_eq!(format_millis(1500), "1.5s");
        assert_eq!(format_millis(90_000), "1.5m");
    }

    #[test]
    fn test_rows_per_sec() {
        let previous = WriterMetricsSnapshot {
            rows_written: 100,
            ..Default::default()
        };
        let snapshot = WriterMetricsSnapshot {
            rows_written: 600,
            ..Default::default()
        };
        assert_eq!(rows_per_sec(&snapshot, Some(&previous), 10), 50.0);
        assert_eq!(rows_per_sec(&snapshot, None, 10), 60.0);
        assert_eq!(rows_per_sec(&snapshot, None, 0), 0.0);
    }
}
