//! tabwrite Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Only the destination usually needs to be specified.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tabwrite_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[write]\ntable = \"proj:ds.events\"").unwrap();
//! assert_eq!(config.write.effective_batch_size(), 500);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [metrics]
//! interval = "30s"
//!
//! [write]
//! table = "proj:analytics.events"
//! schema = "user:STRING,event:STRING"
//! retry_strategy = "retry_on_transient_error"
//! ```

mod error;
mod logging;
mod metrics;
mod validation;
mod write;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use validation::validate_write;
pub use write::{
    CreateDisposition, DEFAULT_BATCH_SIZE, DEFAULT_BUNDLE_SIZE, DEFAULT_BUNDLE_TIMEOUT,
    DEFAULT_INITIAL_RETRY_DELAY,
    DEFAULT_MAX_BUFFERED_ROWS, DEFAULT_MAX_BUFFERING_DURATION, DEFAULT_MAX_RETRY_DELAY,
    DEFAULT_NUM_SHARDS, RetryConfig, RetryStrategy, RuntimeConfig, SCHEMA_AUTODETECT,
    WriteConfig, WriteDisposition, WriteMethod,
};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Streaming-insert write path
    pub write: WriteConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.write.max_buffered_rows, DEFAULT_MAX_BUFFERED_ROWS);
        assert!(config.write.table.is_none());
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"

[metrics]
enabled = true
interval = "5s"
format = "json"

[write]
table = "events"
dataset = "analytics"
project = "acme"
schema = "user:STRING,event:STRING"
create_disposition = "create_never"
retry_strategy = "retry_never"
batch_size = 100
max_buffered_rows = 400
ignore_insert_ids = true
num_shards = 16

[write.retry]
initial_delay = "50ms"
max_delay = "10s"

[write.runtime]
workers = 2
bundle_size = 256
bundle_timeout = "250ms"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.metrics.interval, Duration::from_secs(5));
        assert_eq!(config.write.table.as_deref(), Some("events"));
        assert_eq!(config.write.dataset.as_deref(), Some("analytics"));
        assert_eq!(config.write.project.as_deref(), Some("acme"));
        assert_eq!(config.write.create_disposition, CreateDisposition::CreateNever);
        assert_eq!(config.write.retry_strategy, RetryStrategy::RetryNever);
        assert_eq!(config.write.effective_batch_size(), 100);
        assert_eq!(config.write.max_buffered_rows, 400);
        assert!(config.write.ignore_insert_ids);
        assert_eq!(config.write.num_shards, 16);
        assert_eq!(config.write.retry.initial_delay, Duration::from_millis(50));
        assert_eq!(config.write.runtime.workers, 2);
        assert_eq!(config.write.runtime.bundle_size, 256);
        assert_eq!(config.write.runtime.bundle_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let toml = r#"
[write]
table = "proj:ds.events"
write_disposition = "write_truncate"
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/tabwrite.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tabwrite.toml"));
    }
}
