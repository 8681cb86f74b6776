//! Streaming-insert writer
//!
//! Delivers rows to remote tables through a row-insert API.
//!
//! # Features
//!
//! - **Per-destination batching**: one buffer per table, flushed at
//!   `batch_size` rows
//! - **Bounded memory**: all buffers flushed once `max_buffered_rows` is
//!   reached
//! - **Dedup ids**: each row keeps its insert id across retries
//! - **Partial-failure handling**: failed rows are retried with fuzzed
//!   exponential backoff or dead-lettered, per the retry strategy
//! - **Create-or-get once**: a shared cache skips tables already confirmed

mod buffer;
mod client;
mod config;
mod error;
mod metrics;
mod retry;
mod table_cache;
mod writer;

pub use client::{ClientError, InsertClient, InsertResponse, RowError, TableClient};
pub use config::WriterConfig;
pub use error::WriterError;
pub use metrics::{WriterMetrics, WriterMetricsHandle};
pub use retry::{
    BACKOFF_FACTOR, BACKOFF_FUZZ, Backoff, BackoffIntervals, PERMANENT_REASONS, is_transient,
    should_retry,
};
pub use table_cache::KnownTables;
pub use writer::{FailedRow, Payload, StreamingInsertWriter, WriteElement, WriteOutcome};
