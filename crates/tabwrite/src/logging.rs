//! Tracing subscriber setup
//!
//! Level resolution: `--log-level` flag > `[log]` config section.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tabwrite_config::{LogConfig, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Filter directive for this run
pub fn resolve_directive(cli_level: Option<&str>, log: &LogConfig) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => log.directive(),
    }
}

/// Initialize the tracing subscriber for logging
pub fn init_logging(log: &LogConfig, cli_level: Option<&str>) -> Result<()> {
    let directive = resolve_directive(cli_level, log);
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = match &log.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };

    let layer = match log.format {
        LogFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabwrite_config::LogLevel;

    #[test]
    fn test_cli_level_wins() {
        let log = LogConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(resolve_directive(Some("debug"), &log), "debug");
        assert_eq!(resolve_directive(None, &log), "warn");
    }
}
