//! Writer configuration
//!
//! The subset of `[write]` one writer needs, with builder methods for
//! programmatic use.

use std::time::Duration;

use tabwrite_config::{
    CreateDisposition, DEFAULT_BATCH_SIZE, DEFAULT_INITIAL_RETRY_DELAY, DEFAULT_MAX_BUFFERED_ROWS,
    DEFAULT_MAX_RETRY_DELAY, RetryStrategy, WriteConfig, WriteDisposition,
};

use super::retry::Backoff;

/// Configuration for a streaming-insert writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Rows per insert call
    pub batch_size: usize,

    /// Rows buffered across destinations before flushing all
    pub max_buffered_rows: usize,

    /// Failed-row retry strategy
    pub retry_strategy: RetryStrategy,

    /// Send rows without dedup ids
    pub ignore_insert_ids: bool,

    /// Table creation behaviour
    pub create_disposition: CreateDisposition,

    /// Existing-data behaviour, passed through to create-or-get
    pub write_disposition: WriteDisposition,

    /// First backoff delay
    pub retry_initial_delay: Duration,

    /// Backoff cap
    pub retry_max_delay: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_buffered_rows: DEFAULT_MAX_BUFFERED_ROWS,
            retry_strategy: RetryStrategy::default(),
            ignore_insert_ids: false,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
            retry_initial_delay: DEFAULT_INITIAL_RETRY_DELAY,
            retry_max_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

impl From<&WriteConfig> for WriterConfig {
    fn from(write: &WriteConfig) -> Self {
        Self {
            batch_size: write.effective_batch_size(),
            max_buffered_rows: write.max_buffered_rows,
            retry_strategy: write.retry_strategy,
            ignore_insert_ids: write.ignore_insert_ids,
            create_disposition: write.create_disposition,
            write_disposition: write.write_disposition,
            retry_initial_delay: write.retry.initial_delay,
            retry_max_delay: write.retry.max_delay,
        }
    }
}

impl WriterConfig {
    /// Set rows per insert call
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
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

    /// Suppress dedup ids
    pub fn with_ignore_insert_ids(mut self, ignore: bool) -> Self {
        self.ignore_insert_ids = ignore;
        self
    }

    /// Set the create disposition
    pub fn with_create_disposition(mut self, disposition: CreateDisposition) -> Self {
        self.create_disposition = disposition;
        self
    }

    /// Set the backoff bounds
    pub fn with_retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_delay = initial;
        self.retry_max_delay = max;
        self
    }

    /// Backoff built from the configured bounds
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_initial_delay, self.retry_max_delay)
    }
}
