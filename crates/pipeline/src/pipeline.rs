//! Streaming write pipeline
//!
//! `StreamingWrite` connects an input channel of rows to a pool of execution
//! units. A single dispatcher routes each row, tags it with an insert id,
//! applies the configured sharding policy and hands bundles to the units
//! over bounded queues. Rows that exhaust their retry policy leave through
//! the dead-letter channel.
//!
//! ```text
//!                 ┌── fixed: Reshuffle (dest, shard) ──┐
//! rows ──route──tag                                     ├──hash(key)──> unit 0..N ──> dead letters
//!                 └── auto: GroupIntoBatches ──────────┘
//! ```

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tabwrite_config::{WriteConfig, validate_write};
use tabwrite_metrics::WriterMetricsConfig;
use tabwrite_routing::{
    DestinationResolver, DestinationRouter, InsertIdGenerator, Row, SchemaResolver, ShardedKey,
    TableRef, TaggedRow,
};
use tabwrite_sinks::streaming::{
    FailedRow, InsertClient, KnownTables, StreamingInsertWriter, TableClient, WriterConfig,
    WriterMetrics, WriterMetricsHandle,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::auto_shard::{GroupIntoBatches, KeyedBatch};
use crate::error::{PipelineError, Result};
use crate::metrics::{PipelineMetrics, QueueWaitTracker};
use crate::reshuffle::{CommitLog, Reshuffle, ShardGroup};
use crate::unit::{Bundle, ExecutionUnit, WriteSummary};
use crate::unit_handle::UnitHandle;

/// Whether the input ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundedness {
    /// The input is finite (a file, a fixed collection)
    #[default]
    Bounded,
    /// The input may never end (a socket, stdin)
    Unbounded,
}

/// A configured streaming-insert write
pub struct StreamingWrite {
    write: WriteConfig,
    router: DestinationRouter,
    schemas: SchemaResolver,
    inserter: Arc<dyn InsertClient>,
    tables: Arc<dyn TableClient>,
    known_tables: Arc<KnownTables>,
    commits: Arc<CommitLog>,
    boundedness: Boundedness,
    shard_seed: Option<u64>,
    metrics: Arc<WriterMetrics>,
    pipeline_metrics: Arc<PipelineMetrics>,
}

impl StreamingWrite {
    /// Create a write to the destinations chosen by `resolver`
    ///
    /// The configuration is validated before the creation schema is parsed
    /// from `write.schema`.
    pub fn new(
        write: WriteConfig,
        resolver: DestinationResolver,
        inserter: Arc<dyn InsertClient>,
        tables: Arc<dyn TableClient>,
    ) -> Result<Self> {
        validate_write(&write)?;
        let schemas = SchemaResolver::from_config(&write)?;
        let router = DestinationRouter::new(resolver, write.default_project.clone());
        Ok(Self {
            write,
            router,
            schemas,
            inserter,
            tables,
            known_tables: Arc::new(KnownTables::new()),
            commits: Arc::new(CommitLog::new()),
            boundedness: Boundedness::default(),
            shard_seed: None,
            metrics: Arc::new(WriterMetrics::new()),
            pipeline_metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Create a write whose destination comes from the configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid, and
    /// `MissingDestination` if neither `table` nor `table_field` is set.
    pub fn from_config(
        write: WriteConfig,
        inserter: Arc<dyn InsertClient>,
        tables: Arc<dyn TableClient>,
    ) -> Result<Self> {
        validate_write(&write)?;
        let resolver =
            DestinationResolver::from_config(&write)?.ok_or(PipelineError::MissingDestination)?;
        Self::new(write, resolver, inserter, tables)
    }

    /// Resolve creation schemas with `schemas`
    pub fn with_schema_resolver(mut self, schemas: SchemaResolver) -> Self {
        self.schemas = schemas;
        self
    }

    /// Share a known-tables cache with other writes in this process
    pub fn with_known_tables(mut self, known_tables: Arc<KnownTables>) -> Self {
        self.known_tables = known_tables;
        self
    }

    /// Declare whether the input ends
    pub fn with_boundedness(mut self, boundedness: Boundedness) -> Self {
        self.boundedness = boundedness;
        self
    }

    /// Draw fixed shards from a seeded generator
    pub fn with_shard_seed(mut self, seed: u64) -> Self {
        self.shard_seed = Some(seed);
        self
    }

    /// Write configuration
    pub fn config(&self) -> &WriteConfig {
        &self.write
    }

    /// Known-tables cache
    pub fn known_tables(&self) -> &Arc<KnownTables> {
        &self.known_tables
    }

    /// Commit log shared by every execution unit
    pub fn commit_log(&self) -> &Arc<CommitLog> {
        &self.commits
    }

    /// Writer metrics shared by every execution unit
    pub fn metrics(&self) -> &WriterMetrics {
        &self.metrics
    }

    /// Dispatcher metrics
    pub fn pipeline_metrics(&self) -> &PipelineMetrics {
        &self.pipeline_metrics
    }

    /// Get a metrics handle for reporting
    ///
    /// The handle stays valid after `run()` consumes the write.
    pub fn metrics_handle(&self, config: WriterMetricsConfig) -> WriterMetricsHandle {
        WriterMetricsHandle::new("streaming", Arc::clone(&self.metrics), config)
    }

    /// Check the configuration against the input
    pub fn validate(&self) -> Result<()> {
        validate_write(&self.write)?;
        if self.write.with_auto_sharding && self.boundedness == Boundedness::Bounded {
            return Err(PipelineError::AutoShardingOnBoundedInput);
        }
        Ok(())
    }

    /// Write every row from `input` until it closes
    ///
    /// Failed rows are sent to `dead_letters`. Returns once every execution
    /// unit has flushed its last bundle.
    pub async fn run(
        self,
        input: mpsc::Receiver<Row>,
        dead_letters: mpsc::Sender<FailedRow>,
    ) -> Result<WriteSummary> {
        self.validate()?;

        let runtime = &self.write.runtime;
        let writer_config = WriterConfig::from(&self.write);
        let mut handles = Vec::with_capacity(runtime.workers);
        let mut units: Vec<JoinHandle<Result<WriteSummary>>> = Vec::with_capacity(runtime.workers);

        for id in 0..runtime.workers {
            let name = format!("unit-{}", id);
            let writer = StreamingInsertWriter::new(
                writer_config.clone(),
                Arc::clone(&self.inserter),
                Arc::clone(&self.tables),
                Arc::clone(&self.known_tables),
            )
            .with_schema_resolver(self.schemas.clone())
            .with_metrics(Arc::clone(&self.metrics))
            .with_name(name.clone());

            let unit =
                ExecutionUnit::new(id, writer, Arc::clone(&self.commits), dead_letters.clone())
                    .with_metrics(Arc::clone(&self.pipeline_metrics));

            let (tx, rx) = mpsc::channel(runtime.queue_size);
            units.push(tokio::spawn(unit.run(rx)));
            handles.push(UnitHandle::new(id, name, tx));
        }
        drop(dead_letters);

        tracing::info!(
            workers = runtime.workers,
            bundle_size = runtime.bundle_size,
            auto_sharding = self.write.with_auto_sharding,
            num_shards = self.write.num_shards,
            retry_strategy = %self.write.retry_strategy,
            "streaming write starting"
        );

        let mut dispatcher = Dispatcher::new(&self, handles);
        let dispatched = dispatcher.run(input).await;
        drop(dispatcher);

        let mut summary = WriteSummary {
            rows_received: self.pipeline_metrics.snapshot().rows_received,
            ..WriteSummary::default()
        };
        let mut unit_error = None;
        for (id, unit) in units.into_iter().enumerate() {
            match unit.await {
                Ok(Ok(unit_summary)) => summary.merge(unit_summary),
                Ok(Err(e)) => {
                    unit_error.get_or_insert(e);
                }
                Err(e) => {
                    unit_error.get_or_insert(PipelineError::unit_stopped(id, e.to_string()));
                }
            }
        }

        if let Some(e) = unit_error {
            return Err(e);
        }
        dispatched?;

        tracing::info!(
            rows_received = summary.rows_received,
            rows_committed = summary.rows_committed,
            rows_dead_lettered = summary.rows_dead_lettered,
            bundles = summary.bundles,
            "streaming write finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for StreamingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingWrite")
            .field("router", &self.router)
            .field("schemas", &self.schemas)
            .field("boundedness", &self.boundedness)
            .field("workers", &self.write.runtime.workers)
            .finish()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

enum Sharding {
    Fixed {
        reshuffle: Reshuffle,
        pending: Vec<(TableRef, TaggedRow)>,
    },
    Auto(GroupIntoBatches),
}

/// Routes, tags and shards rows, then feeds the units
struct Dispatcher {
    router: DestinationRouter,
    sharding: Sharding,
    units: Vec<UnitHandle>,
    commits: Arc<CommitLog>,
    bundle_size: usize,
    /// Cut partial bundles on this period; set for unbounded input
    bundle_timeout: Option<Duration>,
    ids: InsertIdGenerator,
    in_bundle: usize,
    next_bundle: u64,
    metrics: Arc<PipelineMetrics>,
    waits: QueueWaitTracker,
}

impl Dispatcher {
    fn new(write: &StreamingWrite, units: Vec<UnitHandle>) -> Self {
        let config = &write.write;
        let sharding = if config.with_auto_sharding {
            Sharding::Auto(GroupIntoBatches::new(
                config.auto_shard_batch_size(),
                config.max_buffering_duration,
            ))
        } else {
            let reshuffle = match write.shard_seed {
                Some(seed) => Reshuffle::with_seed(config.num_shards, seed),
                None => Reshuffle::new(config.num_shards),
            };
            Sharding::Fixed {
                reshuffle,
                pending: Vec::new(),
            }
        };

        Self {
            router: write.router.clone(),
            sharding,
            units,
            commits: Arc::clone(&write.commits),
            bundle_size: config.runtime.bundle_size,
            bundle_timeout: match write.boundedness {
                Boundedness::Unbounded => Some(config.runtime.bundle_timeout),
                Boundedness::Bounded => None,
            },
            ids: InsertIdGenerator::new(),
            in_bundle: 0,
            next_bundle: 0,
            metrics: Arc::clone(&write.pipeline_metrics),
            waits: QueueWaitTracker::new(),
        }
    }

    async fn run(&mut self, mut input: mpsc::Receiver<Row>) -> Result<()> {
        let tick = match &self.sharding {
            Sharding::Auto(batcher) => Some(batcher.max_buffering()),
            Sharding::Fixed { .. } => self.bundle_timeout,
        }
        .map(|period| period.max(Duration::from_millis(1)));

        match tick {
            None => {
                while let Some(row) = input.recv().await {
                    self.accept(row).await?;
                }
            }
            Some(period) => {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        row = input.recv() => match row {
                            Some(row) => self.accept(row).await?,
                            None => break,
                        },
                        _ = interval.tick() => self.on_tick().await?,
                    }
                }
            }
        }

        self.cut_bundle().await?;
        let rest = match &mut self.sharding {
            Sharding::Auto(batcher) => batcher.drain(),
            Sharding::Fixed { .. } => Vec::new(),
        };
        for batch in rest {
            self.send_batch(batch).await?;
        }
        Ok(())
    }

    async fn accept(&mut self, row: Row) -> Result<()> {
        self.metrics.record_received();
        let destination = self.router.route(&row)?;
        let tagged = TaggedRow::new(row, self.ids.next_id());
        self.in_bundle += 1;

        let ready = match &mut self.sharding {
            Sharding::Fixed { pending, .. } => {
                pending.push((destination, tagged));
                None
            }
            Sharding::Auto(batcher) => batcher.push(destination, tagged),
        };
        if let Some(batch) = ready {
            self.send_batch(batch).await?;
        }

        if self.in_bundle >= self.bundle_size {
            self.cut_bundle().await?;
        }
        Ok(())
    }

    /// Emit expired auto-shard batches, or cut the partial fixed-shard
    /// bundle
    async fn on_tick(&mut self) -> Result<()> {
        match self.sharding {
            Sharding::Auto(_) => self.flush_expired().await,
            Sharding::Fixed { .. } => self.cut_bundle().await,
        }
    }

    async fn flush_expired(&mut self) -> Result<()> {
        let due = match &mut self.sharding {
            Sharding::Auto(batcher) => batcher.expired(Instant::now()),
            Sharding::Fixed { .. } => Vec::new(),
        };
        for batch in due {
            self.send_batch(batch).await?;
        }
        Ok(())
    }

    /// End the current input bundle: shard pending rows and start a fresh
    /// insert-id session
    async fn cut_bundle(&mut self) -> Result<()> {
        if self.in_bundle == 0 {
            return Ok(());
        }
        self.in_bundle = 0;
        self.ids = InsertIdGenerator::new();

        let bundle = self.next_bundle;
        let groups = match &mut self.sharding {
            Sharding::Fixed { reshuffle, pending } => {
                self.next_bundle += 1;
                reshuffle.shuffle(bundle, std::mem::take(pending))
            }
            Sharding::Auto(_) => return Ok(()),
        };

        let mut per_unit: BTreeMap<usize, Vec<ShardGroup>> = BTreeMap::new();
        for group in groups {
            per_unit
                .entry(self.unit_for(&group.id.key))
                .or_default()
                .push(group);
        }
        self.commits.expect(bundle, per_unit.len());
        for (unit, groups) in per_unit {
            self.send(unit, Bundle { id: bundle, groups }).await?;
        }
        Ok(())
    }

    async fn send_batch(&mut self, batch: KeyedBatch) -> Result<()> {
        self.metrics.record_batch_emitted();
        let bundle = self.next_bundle;
        self.next_bundle += 1;
        let unit = self.unit_for(&batch.key);
        let group = batch.into_group(bundle);
        self.commits.expect(bundle, 1);
        self.send(
            unit,
            Bundle {
                id: bundle,
                groups: vec![group],
            },
        )
        .await
    }

    /// The unit owning `key`; the same key always maps to the same unit
    fn unit_for(&self, key: &ShardedKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.units.len() as u64) as usize
    }

    async fn send(&self, unit: usize, bundle: Bundle) -> Result<()> {
        let Some(handle) = self.units.get(unit) else {
            return Err(PipelineError::unit_stopped(unit, "no such unit"));
        };

        match handle.try_send(bundle) {
            Ok(()) => {}
            Err(TrySendError::Full(bundle)) => {
                self.metrics.record_queue_full();
                self.waits.record_wait(bundle.rows() as u64);
                tracing::trace!(unit = handle.name(), "unit queue full, waiting");
                handle
                    .send(bundle)
                    .await
                    .map_err(|_| PipelineError::unit_stopped(handle.id(), "queue closed"))?;
            }
            Err(TrySendError::Closed(_)) => {
                return Err(PipelineError::unit_stopped(handle.id(), "queue closed"));
            }
        }

        self.metrics.record_dispatched();
        Ok(())
    }
}
