//! tabwrite Pipeline
//!
//! Hosts the streaming-insert writer: a dispatcher routes rows from an input
//! channel to a pool of execution units, each a tokio task owning one
//! writer.
//!
//! # Architecture
//!
//! ```text
//! mpsc::Receiver<Row> ──> [Dispatcher] ──Bundle──> [ExecutionUnit 0] ──┐
//!                          route + tag  ──Bundle──> [ExecutionUnit 1] ──┼──> mpsc::Sender<FailedRow>
//!                          shard        ──Bundle──> [ExecutionUnit N] ──┘
//! ```
//!
//! # Key Design
//!
//! - **Bounded queues**: units receive bundles over `tokio::sync::mpsc`
//!   channels; a slow backend stalls the dispatcher instead of growing memory
//! - **Stable keys**: a shard key always lands on the same unit
//! - **Fresh sessions**: every input bundle draws a new insert-id prefix
//! - **Shared state**: only the known-tables cache, the commit log and the
//!   metrics atomics are shared between units
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabwrite_pipeline::StreamingWrite;
//! use tabwrite_sinks::memory::MemoryTableStore;
//! use tokio::sync::mpsc;
//!
//! let store = Arc::new(MemoryTableStore::new());
//! let write = StreamingWrite::from_config(config.write, store.clone(), store.clone())?;
//!
//! let (row_tx, row_rx) = mpsc::channel(1000);
//! let (dead_tx, mut dead_rx) = mpsc::channel(1000);
//! let run = tokio::spawn(write.run(row_rx, dead_tx));
//!
//! row_tx.send(serde_json::json!({"user": "a"})).await?;
//! drop(row_tx);
//! let summary = run.await??;
//! ```

mod auto_shard;
mod error;
mod metrics;
mod pipeline;
mod reshuffle;
mod unit;
mod unit_handle;

pub use auto_shard::{GroupIntoBatches, KeyedBatch};
pub use error::{PipelineError, Result};
pub use metrics::{PipelineMetrics, PipelineSnapshot, QueueWaitTracker};
pub use pipeline::{Boundedness, StreamingWrite};
pub use reshuffle::{CommitLog, GroupId, Reshuffle, ShardGroup};
pub use unit::{Bundle, ExecutionUnit, WriteSummary};
pub use unit_handle::UnitHandle;

// Re-export key types from dependencies for convenience
pub use tabwrite_routing::{DestinationResolver, Row, SchemaResolver, TableRef};
pub use tabwrite_sinks::streaming::{FailedRow, KnownTables};

/// Default capacity of the input row channel
pub const DEFAULT_INPUT_CHANNEL_SIZE: usize = 10_000;

/// Default capacity of the dead-letter channel
pub const DEFAULT_DEAD_LETTER_CHANNEL_SIZE: usize = 1000;
