//! Streaming-insert writer
//!
//! One writer is the sequential state of one execution unit: per-destination
//! buffers, the known-tables cache and the flush/retry loop. Every flush is
//! awaited in place, so flushes for a destination never overlap.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tabwrite_config::CreateDisposition;
use tabwrite_metrics::WriterMetricsConfig;
use tabwrite_routing::{InsertId, Row, SchemaResolver, TableRef, TableSchema, TaggedRow};

use super::buffer::RowBuffers;
use super::client::{InsertClient, RowError, TableClient};
use super::config::WriterConfig;
use super::error::WriterError;
use super::metrics::{WriterMetrics, WriterMetricsHandle};
use super::retry::{Backoff, should_retry};
use super::table_cache::KnownTables;

// =============================================================================
// Elements and Outcomes
// =============================================================================

/// Rows for one destination, as delivered to the writer
#[derive(Debug, Clone)]
pub enum Payload {
    /// A single row, buffered until a threshold is reached
    Row(TaggedRow),
    /// A complete batch, flushed immediately
    Batch(Vec<TaggedRow>),
}

/// Unit of work for the writer
#[derive(Debug, Clone)]
pub struct WriteElement {
    /// Fully qualified destination
    pub destination: TableRef,
    /// Row or pre-built batch
    pub payload: Payload,
}

impl WriteElement {
    /// A single row
    pub fn row(destination: TableRef, row: TaggedRow) -> Self {
        Self {
            destination,
            payload: Payload::Row(row),
        }
    }

    /// A pre-built batch
    pub fn batch(destination: TableRef, rows: Vec<TaggedRow>) -> Self {
        Self {
            destination,
            payload: Payload::Batch(rows),
        }
    }
}

/// A row the retry policy gave up on
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRow {
    /// Destination the row was meant for
    pub destination: TableRef,
    /// Row payload
    pub row: Row,
    /// Last error reason reported for the row
    pub reason: String,
}

/// Result of one flush
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// `rows` rows were committed to `destination`
    Committed {
        /// Destination table
        destination: TableRef,
        /// Number of committed rows
        rows: usize,
    },
    /// A row was given up on
    DeadLettered(FailedRow),
}

type Result<T> = std::result::Result<T, WriterError>;

// =============================================================================
// Streaming Insert Writer
// =============================================================================

/// Buffered, retrying writer for one execution unit
pub struct StreamingInsertWriter {
    /// Configuration
    config: WriterConfig,

    /// Row-insert collaborator
    inserter: Arc<dyn InsertClient>,

    /// Create-or-get collaborator
    tables: Arc<dyn TableClient>,

    /// Creation schema per destination
    schemas: SchemaResolver,

    /// Tables already confirmed, shared process-wide
    known_tables: Arc<KnownTables>,

    /// Per-destination buffers
    buffers: RowBuffers,

    /// Backoff bounds; a fresh sequence is drawn per flush loop
    backoff: Backoff,

    /// Metrics (Arc for sharing with metrics handle)
    metrics: Arc<WriterMetrics>,

    /// Writer name for identification
    name: String,
}

impl StreamingInsertWriter {
    /// Create a writer
    pub fn new(
        config: WriterConfig,
        inserter: Arc<dyn InsertClient>,
        tables: Arc<dyn TableClient>,
        known_tables: Arc<KnownTables>,
    ) -> Self {
        let backoff = config.backoff();
        Self {
            config,
            inserter,
            tables,
            schemas: SchemaResolver::None,
            known_tables,
            buffers: RowBuffers::new(),
            backoff,
            metrics: Arc::new(WriterMetrics::new()),
            name: "streaming".to_string(),
        }
    }

    /// Resolve creation schemas with `schemas`
    pub fn with_schema_resolver(mut self, schemas: SchemaResolver) -> Self {
        self.schemas = schemas;
        self
    }

    /// Record into shared metrics
    pub fn with_metrics(mut self, metrics: Arc<WriterMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the writer name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the writer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get reference to config
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &WriterMetrics {
        &self.metrics
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self, config: WriterMetricsConfig) -> WriterMetricsHandle {
        WriterMetricsHandle::new(self.name.clone(), Arc::clone(&self.metrics), config)
    }

    /// Rows currently buffered across destinations
    pub fn buffered_rows(&self) -> usize {
        self.buffers.total()
    }

    /// Begin a bundle with empty buffers
    pub fn start_bundle(&mut self) {
        if !self.buffers.is_empty() {
            tracing::warn!(
                writer = %self.name,
                rows = self.buffers.total(),
                "discarding rows left over from an unfinished bundle"
            );
        }
        self.buffers.clear();
    }

    /// Accept one element
    ///
    /// Ensures the destination table exists, then buffers the row (flushing
    /// on threshold) or flushes a pre-built batch immediately.
    pub async fn process(&mut self, element: WriteElement) -> Result<Vec<WriteOutcome>> {
        let WriteElement {
            destination,
            payload,
        } = element;

        let schema = self.schemas.resolve(&destination)?;
        self.ensure_table(&destination, schema.as_ref()).await?;

        let key = destination.canonical();
        match payload {
            Payload::Row(row) => {
                self.metrics.record_buffered(1);
                let len = self.buffers.push(&key, &destination, row);
                if len >= self.config.batch_size {
                    Ok(self.flush_batch(&key).await)
                } else if self.buffers.total() >= self.config.max_buffered_rows {
                    tracing::debug!(
                        writer = %self.name,
                        rows = self.buffers.total(),
                        "buffer ceiling reached, flushing all destinations"
                    );
                    Ok(self.flush_all().await)
                } else {
                    Ok(Vec::new())
                }
            }
            Payload::Batch(rows) => {
                self.metrics.record_buffered(rows.len() as u64);
                self.buffers.extend(&key, &destination, rows);
                Ok(self.flush_batch(&key).await)
            }
        }
    }

    /// End a bundle, flushing every remaining destination
    pub async fn finish_bundle(&mut self) -> Vec<WriteOutcome> {
        self.flush_all().await
    }

    /// Flush one destination
    pub async fn flush_batch(&mut self, key: &str) -> Vec<WriteOutcome> {
        let Some(batch) = self.buffers.take(key) else {
            return Vec::new();
        };
        if batch.rows.is_empty() {
            return Vec::new();
        }
        self.insert_with_retry(&batch.table, batch.rows).await
    }

    /// Flush every non-empty destination
    pub async fn flush_all(&mut self) -> Vec<WriteOutcome> {
        let mut outcomes = Vec::new();
        for key in self.buffers.keys() {
            outcomes.extend(self.flush_batch(&key).await);
        }
        outcomes
    }

    /// Issue create-or-get at most once per destination
    async fn ensure_table(&self, table: &TableRef, schema: Option<&TableSchema>) -> Result<()> {
        let key = table.canonical();
        if self.known_tables.contains(&key) {
            return Ok(());
        }
        if self.config.create_disposition == CreateDisposition::CreateNever {
            return Ok(());
        }

        tracing::info!(
            table = %key,
            create_disposition = %self.config.create_disposition,
            has_schema = schema.is_some(),
            "getting or creating table"
        );
        self.tables
            .get_or_create_table(
                table,
                schema,
                self.config.create_disposition,
                self.config.write_disposition,
            )
            .await
            .map_err(|e| WriterError::table_creation(key.clone(), e))?;

        self.metrics.record_table_created();
        self.known_tables.insert(key);
        Ok(())
    }

    /// Insert `rows`, retrying failed rows until they commit or the retry
    /// strategy gives up
    async fn insert_with_retry(&self, table: &TableRef, rows: Vec<TaggedRow>) -> Vec<WriteOutcome> {
        let started = Instant::now();
        let batch_rows = rows.len();
        let mut intervals = self.backoff.intervals();
        let mut remaining = rows;
        let mut committed = 0usize;
        let mut dead: Vec<(TaggedRow, String)> = Vec::new();

        loop {
            let payload: Vec<Row> = remaining.iter().map(|r| r.row.clone()).collect();
            let ids: Option<Vec<InsertId>> = if self.config.ignore_insert_ids {
                None
            } else {
                Some(remaining.iter().map(|r| r.insert_id.clone()).collect())
            };

            self.metrics.record_insert_call();
            tracing::trace!(table = %table, rows = payload.len(), "insert attempt");

            let errors = match self
                .inserter
                .insert_rows(table, &payload, ids.as_deref(), true)
                .await
            {
                Ok(response) => first_error_per_row(response.errors, remaining.len()),
                Err(e) => {
                    self.metrics.record_insert_error();
                    tracing::warn!(error = %e, table = %table, "insert call failed");
                    (0..remaining.len())
                        .map(|i| (i, e.reason().to_string()))
                        .collect()
                }
            };

            committed += remaining.len() - errors.len();
            if errors.is_empty() {
                break;
            }

            self.metrics.record_failed_attempt(errors.len() as u64);
            let retry = errors
                .values()
                .any(|reason| should_retry(self.config.retry_strategy, reason));

            let mut slots: Vec<Option<TaggedRow>> = remaining.into_iter().map(Some).collect();
            let failed: Vec<(TaggedRow, String)> = errors
                .into_iter()
                .filter_map(|(index, reason)| slots[index].take().map(|row| (row, reason)))
                .collect();
            let reason = failed.first().map(|(_, r)| r.as_str()).unwrap_or_default();

            if !retry {
                tracing::error!(
                    table = %table,
                    rows = failed.len(),
                    strategy = %self.config.retry_strategy,
                    reason = %reason,
                    "insert errors will not be retried"
                );
                dead = failed;
                break;
            }

            let delay = intervals.next().unwrap_or(self.backoff.base_delay(u32::MAX));
            tracing::warn!(
                table = %table,
                rows = failed.len(),
                reason = %reason,
                "insert errors, retrying failed rows"
            );
            tracing::info!(
                table = %table,
                delay_ms = delay.as_millis() as u64,
                "sleeping before retrying insert"
            );
            self.metrics.record_retry(delay);
            tokio::time::sleep(delay).await;

            remaining = failed.into_iter().map(|(row, _)| row).collect();
        }

        self.metrics.record_flush(
            batch_rows as u64,
            committed as u64,
            dead.len() as u64,
            started.elapsed(),
        );
        tracing::debug!(
            table = %table,
            rows = batch_rows,
            committed,
            failed = dead.len(),
            "flushed batch"
        );

        let mut outcomes = Vec::with_capacity(dead.len() + 1);
        if committed > 0 {
            outcomes.push(WriteOutcome::Committed {
                destination: table.clone(),
                rows: committed,
            });
        }
        outcomes.extend(dead.into_iter().map(|(tagged, reason)| {
            WriteOutcome::DeadLettered(FailedRow {
                destination: table.clone(),
                row: tagged.row,
                reason,
            })
        }));
        outcomes
    }
}

/// First reported reason for each failed row, ignoring out-of-range indexes
fn first_error_per_row(errors: Vec<RowError>, rows: usize) -> BTreeMap<usize, String> {
    let mut by_index = BTreeMap::new();
    for error in errors {
        if error.index < rows {
            by_index.entry(error.index).or_insert(error.reason);
        } else {
            tracing::warn!(index = error.index, rows, "ignoring error for unknown row index");
        }
    }
    by_index
}
