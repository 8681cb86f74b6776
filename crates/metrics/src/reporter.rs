//! Periodic writer metrics reporter
//!
//! Logs one line per interval for a writer until cancelled.

use std::sync::Arc;

use tabwrite_config::MetricsFormat;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::format::MetricsFormatter;
use crate::{HumanFormatter, JsonFormatter, WriterMetricsProvider, WriterMetricsSnapshot};

/// Per-writer metrics reporter
pub struct MetricsReporter {
    writer: Arc<dyn WriterMetricsProvider>,
    formatter: Box<dyn MetricsFormatter>,
    previous: Option<WriterMetricsSnapshot>,
}

impl MetricsReporter {
    /// Create a new reporter
    pub fn new(writer: Arc<dyn WriterMetricsProvider>, format: MetricsFormat) -> Self {
        let formatter: Box<dyn MetricsFormatter> = match format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };

        Self {
            writer,
            formatter,
            previous: None,
        }
    }

    /// Run the reporter until cancellation
    ///
    /// A final report is logged on cancellation so short runs still show
    /// their totals.
    pub async fn run(mut self, cancel: CancellationToken) {
        let config = self.writer.metrics_config();

        if !config.enabled {
            return;
        }

        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        ticker.tick().await;

        info!(
            writer_id = self.writer.writer_id(),
            interval_secs = config.interval.as_secs(),
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.report(config.interval);
                    break;
                }
                _ = ticker.tick() => {
                    self.report(config.interval);
                }
            }
        }
    }

    /// Report current metrics
    fn report(&mut self, report_interval: Duration) {
        let snapshot = self.writer.snapshot();

        let output = self.formatter.format_writer(
            self.writer.writer_id(),
            &snapshot,
            self.previous.as_ref(),
            report_interval.as_secs(),
        );

        info!("{}", output);

        self.previous = Some(snapshot);
    }
}

/// Spawn a reporter for `writer` if its metrics are enabled
pub fn spawn_reporter(
    writer: Arc<dyn WriterMetricsProvider>,
    format: MetricsFormat,
    cancel: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    if !writer.metrics_config().enabled {
        return None;
    }
    let reporter = MetricsReporter::new(writer, format);
    Some(tokio::spawn(reporter.run(cancel)))
}
