//! JSON metrics formatter
//!
//! # Example Output
//!
//! ```json
//! {"type":"writer","writer_id":"main","period_secs":60,"rows_per_sec":20000.0,"metrics":{...}}
//! ```

use serde::Serialize;

use super::{MetricsFormatter, rows_per_sec};
use crate::WriterMetricsSnapshot;

/// JSON metrics formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct WriterReportJson<'a> {
    #[serde(rename = "type")]
    report_type: &'static str,
    writer_id: &'a str,
    period_secs: u64,
    rows_per_sec: f64,
    metrics: &'a WriterMetricsSnapshot,
}

impl MetricsFormatter for JsonFormatter {
    fn format_writer(
        &self,
        writer_id: &str,
        snapshot: &WriterMetricsSnapshot,
        previous: Option<&WriterMetricsSnapshot>,
        interval_secs: u64,
    ) -> String {
        let json = WriterReportJson {
            report_type: "writer",
            writer_id,
            period_secs: interval_secs,
            rows_per_sec: rows_per_sec(snapshot, previous, interval_secs),
            metrics: snapshot,
        };

        serde_json::to_string(&json).unwrap_or_else(|_| "{}".to_string())
    }
}
