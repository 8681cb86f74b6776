//! Execution units
//!
//! An execution unit is one tokio task owning one [`StreamingInsertWriter`].
//! It processes bundles strictly one after another: every bundle starts with
//! empty buffers and ends with a flush of whatever is left, so a bundle is
//! fully written (or dead-lettered) before the next one begins.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tabwrite_sinks::streaming::{FailedRow, StreamingInsertWriter, WriteElement, WriteOutcome};
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::reshuffle::{CommitLog, GroupId, ShardGroup};

/// A unit of work: shard groups cut from the input together
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Bundle sequence number
    pub id: u64,
    /// Groups routed to this unit
    pub groups: Vec<ShardGroup>,
}

impl Bundle {
    /// Total rows across groups
    pub fn rows(&self) -> usize {
        self.groups.iter().map(ShardGroup::len).sum()
    }
}

/// Totals of a run, or of one unit's share of it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Rows read from the input
    pub rows_received: u64,
    /// Rows committed
    pub rows_committed: u64,
    /// Rows sent to the dead-letter channel
    pub rows_dead_lettered: u64,
    /// Bundles processed
    pub bundles: u64,
    /// Replayed groups skipped
    pub groups_skipped: u64,
    /// Committed rows per canonical destination
    pub committed_by_table: BTreeMap<String, u64>,
}

impl WriteSummary {
    /// Fold another summary into this one
    pub fn merge(&mut self, other: WriteSummary) {
        self.rows_received += other.rows_received;
        self.rows_committed += other.rows_committed;
        self.rows_dead_lettered += other.rows_dead_lettered;
        self.bundles += other.bundles;
        self.groups_skipped += other.groups_skipped;
        for (table, rows) in other.committed_by_table {
            *self.committed_by_table.entry(table).or_insert(0) += rows;
        }
    }
}

/// One sequential writer task
pub struct ExecutionUnit {
    id: usize,
    writer: StreamingInsertWriter,
    commits: Arc<CommitLog>,
    dead_letters: mpsc::Sender<FailedRow>,
    metrics: Arc<PipelineMetrics>,
    summary: WriteSummary,
}

impl ExecutionUnit {
    /// Create a unit around `writer`
    pub fn new(
        id: usize,
        writer: StreamingInsertWriter,
        commits: Arc<CommitLog>,
        dead_letters: mpsc::Sender<FailedRow>,
    ) -> Self {
        Self {
            id,
            writer,
            commits,
            dead_letters,
            metrics: Arc::new(PipelineMetrics::new()),
            summary: WriteSummary::default(),
        }
    }

    /// Record into shared pipeline metrics
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Unit index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Totals so far
    pub fn summary(&self) -> &WriteSummary {
        &self.summary
    }

    /// Process bundles until the queue closes
    pub async fn run(mut self, mut bundles: mpsc::Receiver<Bundle>) -> Result<WriteSummary> {
        tracing::debug!(unit = self.id, writer = %self.writer.name(), "execution unit starting");

        while let Some(bundle) = bundles.recv().await {
            if let Err(e) = self.process_bundle(bundle).await {
                tracing::error!(unit = self.id, error = %e, "execution unit aborted");
                return Err(e);
            }
        }

        tracing::debug!(
            unit = self.id,
            bundles = self.summary.bundles,
            committed = self.summary.rows_committed,
            dead_lettered = self.summary.rows_dead_lettered,
            "execution unit stopping"
        );
        Ok(self.summary)
    }

    /// Write one bundle
    ///
    /// Groups already in the commit log are skipped. Groups written here are
    /// committed once the bundle's final flush has returned. If the unit
    /// aborts partway, rows the writer already gave up on are still
    /// delivered to the dead-letter channel before the error is returned.
    pub async fn process_bundle(&mut self, bundle: Bundle) -> Result<()> {
        let bundle_id = bundle.id;
        self.writer.start_bundle();

        let mut outcomes = Vec::new();
        let written = match self.write_groups(bundle.groups, &mut outcomes).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(dead) = self.deliver(outcomes).await {
                    tracing::error!(
                        unit = self.id,
                        bundle = bundle_id,
                        error = %dead,
                        "failed to deliver dead letters of aborted bundle"
                    );
                }
                return Err(e);
            }
        };
        outcomes.extend(self.writer.finish_bundle().await);

        for id in written {
            self.commits.commit(id);
        }
        self.commits.finish(bundle_id);
        self.summary.bundles += 1;
        tracing::trace!(unit = self.id, bundle = bundle_id, "bundle finished");

        self.deliver(outcomes).await
    }

    /// Feed every uncommitted group to the writer, collecting outcomes as
    /// they are produced
    async fn write_groups(
        &mut self,
        groups: Vec<ShardGroup>,
        outcomes: &mut Vec<WriteOutcome>,
    ) -> Result<Vec<GroupId>> {
        let mut written = Vec::with_capacity(groups.len());
        for group in groups {
            if self.commits.is_committed(&group.id) {
                tracing::debug!(
                    unit = self.id,
                    group = %group.id,
                    "group already committed, skipping"
                );
                self.metrics.record_group_skipped();
                self.summary.groups_skipped += 1;
                continue;
            }

            let ShardGroup {
                id,
                destination,
                rows,
                prebatched,
            } = group;
            if prebatched {
                let element = WriteElement::batch(destination, rows);
                outcomes.extend(self.writer.process(element).await?);
            } else {
                for row in rows {
                    let element = WriteElement::row(destination.clone(), row);
                    outcomes.extend(self.writer.process(element).await?);
                }
            }
            written.push(id);
        }
        Ok(written)
    }

    async fn deliver(&mut self, outcomes: Vec<WriteOutcome>) -> Result<()> {
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                WriteOutcome::Committed { destination, rows } => {
                    let rows = rows as u64;
                    self.summary.rows_committed += rows;
                    *self
                        .summary
                        .committed_by_table
                        .entry(destination.canonical())
                        .or_insert(0) += rows;
                }
                WriteOutcome::DeadLettered(row) => failed.push(row),
            }
        }

        let total = failed.len();
        for (sent, row) in failed.into_iter().enumerate() {
            if self.dead_letters.send(row).await.is_err() {
                return Err(PipelineError::DeadLetterClosed {
                    pending: total - sent,
                });
            }
            self.summary.rows_dead_lettered += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("id", &self.id)
            .field("writer", &self.writer.name())
            .field("bundles", &self.summary.bundles)
            .finish()
    }
}
