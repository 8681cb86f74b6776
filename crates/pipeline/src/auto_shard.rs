//! Auto sharding
//!
//! Groups rows per destination into batches bounded by size and by how long
//! the oldest row has waited. Each emitted batch gets the next shard number
//! of its destination, so a busy destination spreads over more execution
//! units than a quiet one.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tabwrite_routing::{ShardedKey, TableRef, TaggedRow};

use crate::reshuffle::{GroupId, ShardGroup};

/// A batch ready to be written
#[derive(Debug, Clone)]
pub struct KeyedBatch {
    /// Destination plus batch shard
    pub key: ShardedKey,
    /// Destination table
    pub destination: TableRef,
    /// Rows in arrival order
    pub rows: Vec<TaggedRow>,
}

impl KeyedBatch {
    /// Turn into a pre-batched group of bundle `bundle`
    pub fn into_group(self, bundle: u64) -> ShardGroup {
        ShardGroup {
            id: GroupId {
                bundle,
                key: self.key,
            },
            destination: self.destination,
            rows: self.rows,
            prebatched: true,
        }
    }
}

#[derive(Debug)]
struct PendingBatch {
    destination: TableRef,
    rows: Vec<TaggedRow>,
    started: Instant,
}

/// Size- and latency-bounded batching per destination
#[derive(Debug)]
pub struct GroupIntoBatches {
    batch_size: usize,
    max_buffering: Duration,
    pending: BTreeMap<String, PendingBatch>,
    emitted: HashMap<String, u32>,
}

impl GroupIntoBatches {
    /// Batcher emitting at `batch_size` rows or after `max_buffering`
    pub fn new(batch_size: usize, max_buffering: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_buffering,
            pending: BTreeMap::new(),
            emitted: HashMap::new(),
        }
    }

    /// Maximum rows per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Maximum time a row waits before its batch is emitted
    pub fn max_buffering(&self) -> Duration {
        self.max_buffering
    }

    /// Rows waiting across destinations
    pub fn buffered_rows(&self) -> usize {
        self.pending.values().map(|b| b.rows.len()).sum()
    }

    /// Add a row, returning its batch if it is now full
    pub fn push(&mut self, destination: TableRef, row: TaggedRow) -> Option<KeyedBatch> {
        self.push_at(destination, row, Instant::now())
    }

    fn push_at(
        &mut self,
        destination: TableRef,
        row: TaggedRow,
        now: Instant,
    ) -> Option<KeyedBatch> {
        let key = destination.canonical();
        let batch = self
            .pending
            .entry(key.clone())
            .or_insert_with(|| PendingBatch {
                destination,
                rows: Vec::new(),
                started: now,
            });
        batch.rows.push(row);

        if batch.rows.len() >= self.batch_size {
            self.emit(&key)
        } else {
            None
        }
    }

    /// Emit every batch whose oldest row has waited `max_buffering` by `now`
    pub fn expired(&mut self, now: Instant) -> Vec<KeyedBatch> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, b)| now.saturating_duration_since(b.started) >= self.max_buffering)
            .map(|(k, _)| k.clone())
            .collect();
        due.iter().filter_map(|key| self.emit(key)).collect()
    }

    /// Emit every pending batch
    pub fn drain(&mut self) -> Vec<KeyedBatch> {
        let keys: Vec<String> = self.pending.keys().cloned().collect();
        keys.iter().filter_map(|key| self.emit(key)).collect()
    }

    fn emit(&mut self, key: &str) -> Option<KeyedBatch> {
        let batch = self.pending.remove(key)?;
        let counter = self.emitted.entry(key.to_string()).or_insert(0);
        let shard = *counter;
        *counter = counter.wrapping_add(1);
        Some(KeyedBatch {
            key: ShardedKey::new(key, shard),
            destination: batch.destination,
            rows: batch.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabwrite_routing::InsertIdGenerator;

    fn table(spec: &str) -> TableRef {
        TableRef::parse(spec).unwrap()
    }

    fn row(ids: &mut InsertIdGenerator, n: usize) -> TaggedRow {
        TaggedRow::new(json!({"n": n}), ids.next_id())
    }

    #[test]
    fn test_emits_at_batch_size() {
        let mut ids = InsertIdGenerator::new();
        let mut batcher = GroupIntoBatches::new(2, Duration::from_secs(60));

        assert!(batcher.push(table("p:d.a"), row(&mut ids, 0)).is_none());
        assert!(batcher.push(table("p:d.b"), row(&mut ids, 1)).is_none());
        let batch = batcher.push(table("p:d.a"), row(&mut ids, 2)).unwrap();

        assert_eq!(batch.key, ShardedKey::new("p:d.a", 0));
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batcher.buffered_rows(), 1);
    }

    #[test]
    fn test_successive_batches_get_new_shards() {
        let mut ids = InsertIdGenerator::new();
        let mut batcher = GroupIntoBatches::new(1, Duration::from_secs(60));

        let shards: Vec<u32> = (0..3)
            .filter_map(|n| batcher.push(table("p:d.a"), row(&mut ids, n)))
            .map(|b| b.key.shard)
            .collect();
        assert_eq!(shards, [0, 1, 2]);
    }

    #[test]
    fn test_expired_respects_latency_bound() {
        let mut ids = InsertIdGenerator::new();
        let mut batcher = GroupIntoBatches::new(100, Duration::from_millis(200));
        let start = Instant::now();

        batcher.push_at(table("p:d.a"), row(&mut ids, 0), start);
        batcher.push_at(
            table("p:d.b"),
            row(&mut ids, 1),
            start + Duration::from_millis(150),
        );

        assert!(batcher.expired(start + Duration::from_millis(100)).is_empty());

        let due = batcher.expired(start + Duration::from_millis(250));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].destination.canonical(), "p:d.a");

        let due = batcher.expired(start + Duration::from_millis(400));
        assert_eq!(due.len(), 1);
        assert_eq!(batcher.buffered_rows(), 0);
    }

    #[test]
    fn test_drain_emits_everything() {
        let mut ids = InsertIdGenerator::new();
        let mut batcher = GroupIntoBatches::new(100, Duration::from_secs(60));
        for n in 0..5 {
            let dest = if n % 2 == 0 { "p:d.a" } else { "p:d.b" };
            batcher.push(table(dest), row(&mut ids, n));
        }

        let batches = batcher.drain();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.iter().map(|b| b.rows.len()).sum::<usize>(), 5);
        assert!(batcher.drain().is_empty());
    }

    #[test]
    fn test_into_group_is_prebatched() {
        let mut ids = InsertIdGenerator::new();
        let mut batcher = GroupIntoBatches::new(1, Duration::from_secs(60));
        let group = batcher
            .push(table("p:d.a"), row(&mut ids, 0))
            .unwrap()
            .into_group(4);

        assert!(group.prebatched);
        assert_eq!(group.id.bundle, 4);
        assert_eq!(group.len(), 1);
    }
}
