//! tabwrite Sinks
//!
//! The write side of tabwrite: a buffered, retrying streaming-insert writer
//! and the collaborator traits it calls.
//!
//! # Architecture
//!
//! ```text
//! [Execution unit] --WriteElement--> [StreamingInsertWriter] --insert_rows--> [InsertClient]
//!                                           │
//!                                           └──get_or_create_table──> [TableClient]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabwrite_sinks::memory::MemoryTableStore;
//! use tabwrite_sinks::streaming::{KnownTables, StreamingInsertWriter, WriterConfig};
//!
//! let store = Arc::new(MemoryTableStore::new());
//! let mut writer = StreamingInsertWriter::new(
//!     WriterConfig::default(),
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(KnownTables::new()),
//! );
//! writer.start_bundle();
//! let outcomes = writer.process(element).await?;
//! let rest = writer.finish_bundle().await;
//! ```

/// Streaming-insert writer, retry controller and collaborator traits
pub mod streaming;

/// In-memory storage service for dry runs and tests
pub mod memory;
