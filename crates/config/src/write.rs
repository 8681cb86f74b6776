//! Streaming-insert write configuration
//!
//! Everything the write path needs: destination, schema, dispositions,
//! buffering thresholds, retry behaviour and sharding policy.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

// =============================================================================
// Constants
// =============================================================================

/// Rows per insert call when `batch_size` is unset
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Ceiling on rows buffered across all destinations in one execution unit
pub const DEFAULT_MAX_BUFFERED_ROWS: usize = 2000;

/// Virtual shards per destination under fixed sharding
pub const DEFAULT_NUM_SHARDS: u32 = 500;

/// Longest a batch may wait under auto sharding
pub const DEFAULT_MAX_BUFFERING_DURATION: Duration = Duration::from_millis(200);

/// First backoff delay of a flush loop
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Backoff cap
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(1500);

/// Rows per execution-unit bundle cut by the host
pub const DEFAULT_BUNDLE_SIZE: usize = 1000;

/// Longest a partial bundle waits on unbounded input before it is cut
pub const DEFAULT_BUNDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Schema value requesting auto-detection, which streaming inserts reject
pub const SCHEMA_AUTODETECT: &str = "SCHEMA_AUTODETECT";

// =============================================================================
// Enumerations
// =============================================================================

/// What happens when the destination table does not exist
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CreateDisposition {
    /// Issue create-or-get before the first flush to a table
    #[default]
    #[serde(alias = "CREATE_IF_NEEDED")]
    CreateIfNeeded,
    /// Assume the table exists; never issue create-or-get
    #[serde(alias = "CREATE_NEVER")]
    CreateNever,
}

impl CreateDisposition {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateIfNeeded => "CREATE_IF_NEEDED",
            Self::CreateNever => "CREATE_NEVER",
        }
    }
}

impl fmt::Display for CreateDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when the destination table already holds data
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Add rows to the table (the only mode streaming inserts allow)
    #[default]
    #[serde(alias = "WRITE_APPEND")]
    WriteAppend,
    /// Replace the table contents
    #[serde(alias = "WRITE_TRUNCATE")]
    WriteTruncate,
    /// Fail unless the table is empty
    #[serde(alias = "WRITE_EMPTY")]
    WriteEmpty,
}

impl WriteDisposition {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteAppend => "WRITE_APPEND",
            Self::WriteTruncate => "WRITE_TRUNCATE",
            Self::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When rows that failed an insert are sent again
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Retry any failure, forever
    #[default]
    #[serde(alias = "RETRY_ALWAYS")]
    RetryAlways,
    /// Dead-letter every failed row immediately
    #[serde(alias = "RETRY_NEVER")]
    RetryNever,
    /// Retry while at least one failure reason is transient
    #[serde(alias = "RETRY_ON_TRANSIENT_ERROR")]
    RetryOnTransientError,
}

impl RetryStrategy {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetryAlways => "RETRY_ALWAYS",
            Self::RetryNever => "RETRY_NEVER",
            Self::RetryOnTransientError => "RETRY_ON_TRANSIENT_ERROR",
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion method
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMethod {
    /// Streaming inserts (the only method this engine implements)
    #[default]
    Default,
    /// Explicit streaming inserts
    StreamingInserts,
    /// Bulk file loads, handled by a different engine
    FileLoads,
}

// =============================================================================
// Configuration
// =============================================================================

/// Backoff bounds for the retry loop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First (un-jittered) delay
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Largest (un-jittered) delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

/// Host runtime settings: how many execution units run and how input is cut
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of concurrently running execution units
    pub workers: usize,

    /// Input rows per bundle (one execution-unit invocation)
    pub bundle_size: usize,

    /// Bounded queue depth in front of each execution unit
    pub queue_size: usize,

    /// Cut a partial bundle after this long on unbounded input
    #[serde(with = "humantime_serde")]
    pub bundle_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            bundle_size: DEFAULT_BUNDLE_SIZE,
            queue_size: 64,
            bundle_timeout: DEFAULT_BUNDLE_TIMEOUT,
        }
    }
}

/// Streaming-insert write configuration
///
/// # Example
///
/// ```toml
/// [write]
/// table = "my-project:analytics.events"
/// schema = "user:STRING,event:STRING,ts:TIMESTAMP"
/// create_disposition = "create_if_needed"
/// retry_strategy = "retry_on_transient_error"
/// batch_size = 250
///
/// [write.retry]
/// initial_delay = "200ms"
/// max_delay = "25m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Table spec: `project:dataset.table`, `dataset.table`, or a bare table
    /// id when `dataset` is given
    pub table: Option<String>,

    /// Row field holding a per-record table spec (dynamic destinations)
    pub table_field: Option<String>,

    /// Dataset id, when not part of `table`
    pub dataset: Option<String>,

    /// Project id, when not part of `table`
    pub project: Option<String>,

    /// Project used for any destination that omits one
    pub default_project: Option<String>,

    /// Schema for table creation (`name:TYPE,...` or JSON)
    pub schema: Option<String>,

    /// Table creation behaviour
    pub create_disposition: CreateDisposition,

    /// Existing-data behaviour
    pub write_disposition: WriteDisposition,

    /// Ingestion method
    pub method: WriteMethod,

    /// Rows per insert call (default 500); also the auto-sharding batch size
    pub batch_size: Option<usize>,

    /// Rows buffered across destinations before a forced flush of all
    pub max_buffered_rows: usize,

    /// Failed-row retry strategy
    pub retry_strategy: RetryStrategy,

    /// Send rows without dedup ids
    pub ignore_insert_ids: bool,

    /// Use throughput-adaptive sharding instead of fixed sharding
    pub with_auto_sharding: bool,

    /// Fixed sharding fan-out per destination
    pub num_shards: u32,

    /// Auto-sharding buffering latency bound
    #[serde(with = "humantime_serde")]
    pub max_buffering_duration: Duration,

    /// Load-job trigger period; only meaningful for file loads
    #[serde(with = "humantime_serde")]
    pub triggering_frequency: Option<Duration>,

    /// Backoff bounds
    pub retry: RetryConfig,

    /// Host runtime settings
    pub runtime: RuntimeConfig,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            table: None,
            table_field: None,
            dataset: None,
            project: None,
            default_project: None,
            schema: None,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
            method: WriteMethod::default(),
            batch_size: None,
            max_buffered_rows: DEFAULT_MAX_BUFFERED_ROWS,
            retry_strategy: RetryStrategy::default(),
            ignore_insert_ids: false,
            with_auto_sharding: false,
            num_shards: DEFAULT_NUM_SHARDS,
            max_buffering_duration: DEFAULT_MAX_BUFFERING_DURATION,
            triggering_frequency: None,
            retry: RetryConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl WriteConfig {
    /// Rows per insert call on the per-record path
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Batch size handed to the auto-sharding batcher
    ///
    /// Falls back to the buffering ceiling, not the per-record default.
    pub fn auto_shard_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(self.max_buffered_rows)
    }

    /// Set the static table spec
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Route each row by the table spec found in `field`
    pub fn with_table_field(mut self, field: impl Into<String>) -> Self {
        self.table_field = Some(field.into());
        self
    }

    /// Set the default project
    pub fn with_default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = Some(project.into());
        self
    }

    /// Set the schema string
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the rows-per-insert threshold
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the buffering ceiling
    pub fn with_max_buffered_rows(mut self, rows: usize) -> Self {
        self.max_buffered_rows = rows;
        self
    }

    /// Set the retry strategy
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Set the create disposition
    pub fn with_create_disposition(mut self, disposition: CreateDisposition) -> Self {
        self.create_disposition = disposition;
        self
    }

    /// Suppress dedup ids
    pub fn with_ignore_insert_ids(mut self, ignore: bool) -> Self {
        self.ignore_insert_ids = ignore;
        self
    }

    /// Select auto sharding
    pub fn with_auto_sharding(mut self, enabled: bool) -> Self {
        self.with_auto_sharding = enabled;
        self
    }

    /// Set the fixed-shard fan-out
    pub fn with_num_shards(mut self, shards: u32) -> Self {
        self.num_shards = shards;
        self
    }

    /// Set the backoff bounds
    pub fn with_retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.retry = RetryConfig {
            initial_delay: initial,
            max_delay: max,
        };
        self
    }

    /// Set the number of execution units
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.runtime.workers = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WriteConfig::default();
        assert_eq!(config.effective_batch_size(), 500);
        assert_eq!(config.max_buffered_rows, 2000);
        assert_eq!(config.auto_shard_batch_size(), 2000);
        assert_eq!(config.num_shards, 500);
        assert_eq!(config.retry_strategy, RetryStrategy::RetryAlways);
        assert_eq!(config.create_disposition, CreateDisposition::CreateIfNeeded);
        assert_eq!(config.write_disposition, WriteDisposition::WriteAppend);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(200));
        assert_eq!(config.retry.max_delay, Duration::from_secs(1500));
        assert!(config.runtime.workers > 0);
        assert!(!config.ignore_insert_ids);
    }

    #[test]
    fn test_auto_shard_batch_size_uses_batch_size_when_set() {
        let config = WriteConfig::default().with_batch_size(100);
        assert_eq!(config.auto_shard_batch_size(), 100);
        assert_eq!(config.effective_batch_size(), 100);
    }

    #[test]
    fn test_deserialize_upper_case_aliases() {
        let config: WriteConfig = toml::from_str(
            r#"
create_disposition = "CREATE_NEVER"
write_disposition = "WRITE_APPEND"
retry_strategy = "RETRY_ON_TRANSIENT_ERROR"
"#,
        )
        .unwrap();
        assert_eq!(config.create_disposition, CreateDisposition::CreateNever);
        assert_eq!(config.retry_strategy, RetryStrategy::RetryOnTransientError);
    }

    #[test]
    fn test_deserialize_durations() {
        let config: WriteConfig = toml::from_str(
            r#"
max_buffering_duration = "500ms"
triggering_frequency = "5m"

[retry]
initial_delay = "10ms"
max_delay = "1s"
"#,
        )
        .unwrap();
        assert_eq!(config.max_buffering_duration, Duration::from_millis(500));
        assert_eq!(config.triggering_frequency, Some(Duration::from_secs(300)));
        assert_eq!(config.retry.initial_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(RetryStrategy::RetryNever.to_string(), "RETRY_NEVER");
        assert_eq!(CreateDisposition::CreateNever.to_string(), "CREATE_NEVER");
        assert_eq!(WriteDisposition::WriteEmpty.to_string(), "WRITE_EMPTY");
    }
}
