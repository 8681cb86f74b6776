//! Logging configuration
//!
//! Controls the `tracing` output of the writer and the CLI.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very verbose, includes every insert attempt
    Trace,
    /// Per-flush detail
    Debug,
    /// Lifecycle and backoff sleeps (default)
    #[default]
    Info,
    /// Retried insert errors
    Warn,
    /// Insert errors that will not be retried
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Write to stdout
    Stdout,
    /// Write to stderr (default, keeps stdout free for summaries)
    #[default]
    Stderr,
    /// Append to a file
    #[serde(untagged)]
    File(String),
}

/// Logging configuration
///
/// # Example
///
/// ```toml
/// [log]
/// level = "info"
/// format = "json"
/// output = "stderr"
///
/// [log.targets]
/// tabwrite_sinks = "debug"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base log level
    pub level: LogLevel,

    /// Output format (console, json)
    pub format: LogFormat,

    /// Output destination (stdout, stderr, or file path)
    pub output: LogOutput,

    /// Per-target level overrides, e.g. `tabwrite_sinks = "debug"`
    pub targets: BTreeMap<String, LogLevel>,
}

impl LogConfig {
    /// Build an `EnvFilter`-compatible directive string
    ///
    /// The base level comes first, followed by `target=level` overrides.
    pub fn directive(&self) -> String {
        let mut directive = self.level.as_str().to_string();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level.as_str());
        }
        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Console);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.directive(), "info");
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
level = "warn"
format = "json"
output = "logs/tabwrite.log"

[targets]
tabwrite_sinks = "debug"
tabwrite_pipeline = "trace"
"#;
        let config: LogConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::File("logs/tabwrite.log".into()));
        assert_eq!(
            config.directive(),
            "warn,tabwrite_pipeline=trace,tabwrite_sinks=debug"
        );
    }

    #[test]
    fn test_deserialize_stdout() {
        let config: LogConfig = toml::from_str(r#"output = "stdout""#).unwrap();
        assert_eq!(config.output, LogOutput::Stdout);
    }
}
