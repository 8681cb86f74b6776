//! Fixed-shard reshuffle
//!
//! Rows of a bundle are keyed by (destination, random shard), grouped per
//! key, and handed to the execution unit that owns the key. The shard is
//! dropped again before the insert call. A [`CommitLog`] records the
//! groups units have written so a redelivered group is skipped rather than
//! written twice. Once every part of a bundle has finished, the bundle falls
//! below the log's low watermark and its group entries are dropped.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use parking_lot::Mutex;
use tabwrite_routing::{FixedSharder, ShardedKey, TableRef, TaggedRow};

/// Identity of one shard group: the bundle it was cut from plus its key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    /// Bundle sequence number
    pub bundle: u64,
    /// Destination and shard
    pub key: ShardedKey,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.bundle)
    }
}

/// Rows sharing one shard key
#[derive(Debug, Clone)]
pub struct ShardGroup {
    /// Group identity
    pub id: GroupId,
    /// Destination, with the shard already dropped
    pub destination: TableRef,
    /// Rows in arrival order
    pub rows: Vec<TaggedRow>,
    /// Rows form one complete batch and bypass per-row buffering
    pub prebatched: bool,
}

impl ShardGroup {
    /// Number of rows in the group
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the group has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Assigns fixed shards and groups a bundle by shard key
#[derive(Debug)]
pub struct Reshuffle {
    sharder: FixedSharder,
}

impl Reshuffle {
    /// Reshuffle over `num_shards` shards
    pub fn new(num_shards: u32) -> Self {
        Self {
            sharder: FixedSharder::new(num_shards),
        }
    }

    /// Reshuffle with a deterministic shard sequence
    pub fn with_seed(num_shards: u32, seed: u64) -> Self {
        Self {
            sharder: FixedSharder::with_seed(num_shards, seed),
        }
    }

    /// Number of shards per destination
    pub fn num_shards(&self) -> u32 {
        self.sharder.num_shards()
    }

    /// Shard and group one bundle
    ///
    /// Groups come out ordered by key; rows keep their arrival order within
    /// a group.
    pub fn shuffle(&mut self, bundle: u64, rows: Vec<(TableRef, TaggedRow)>) -> Vec<ShardGroup> {
        let mut groups: BTreeMap<ShardedKey, (TableRef, Vec<TaggedRow>)> = BTreeMap::new();
        for (destination, row) in rows {
            let key = self.sharder.assign(&destination);
            groups
                .entry(key)
                .or_insert_with(|| (destination, Vec::new()))
                .1
                .push(row);
        }

        groups
            .into_iter()
            .map(|(key, (destination, rows))| ShardGroup {
                id: GroupId { bundle, key },
                destination,
                rows,
                prebatched: false,
            })
            .collect()
    }
}

/// Groups already written, shared by every execution unit
///
/// The dispatcher announces how many parts (one per receiving unit) each
/// bundle was split into with [`CommitLog::expect`]. Units commit the groups
/// they wrote and then [`CommitLog::finish`] their part. Bundle ids are
/// contiguous, so every bundle below the low watermark is fully written and
/// only groups of open bundles are kept.
#[derive(Debug, Default)]
pub struct CommitLog {
    state: Mutex<CommitState>,
}

#[derive(Debug, Default)]
struct CommitState {
    /// Every bundle below this id is fully written
    low_watermark: u64,
    /// Parts still outstanding per open bundle
    outstanding: BTreeMap<u64, usize>,
    /// Open bundles whose parts have all finished, waiting on a gap below
    finished: BTreeSet<u64>,
    /// Groups written in open bundles
    committed: HashSet<GroupId>,
}

impl CommitLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce that `bundle` was split into `parts` unit bundles
    ///
    /// A bundle that is never announced counts as a single part.
    pub fn expect(&self, bundle: u64, parts: usize) {
        let mut state = self.state.lock();
        if bundle >= state.low_watermark {
            state.outstanding.insert(bundle, parts.max(1));
        }
    }

    /// Check whether `id` was already committed
    pub fn is_committed(&self, id: &GroupId) -> bool {
        let state = self.state.lock();
        id.bundle < state.low_watermark || state.committed.contains(id)
    }

    /// Mark `id` committed; returns false if it already was
    pub fn commit(&self, id: GroupId) -> bool {
        let mut state = self.state.lock();
        if id.bundle < state.low_watermark {
            return false;
        }
        state.committed.insert(id)
    }

    /// Mark one part of `bundle` finished
    ///
    /// When the last part finishes and no earlier bundle is still open, the
    /// watermark advances and the entries below it are dropped.
    pub fn finish(&self, bundle: u64) {
        let mut state = self.state.lock();
        if bundle < state.low_watermark {
            return;
        }

        let done = match state.outstanding.get_mut(&bundle) {
            Some(parts) => {
                *parts = parts.saturating_sub(1);
                *parts == 0
            }
            None => true,
        };
        if !done {
            return;
        }
        state.outstanding.remove(&bundle);
        state.finished.insert(bundle);

        let before = state.low_watermark;
        loop {
            let next = state.low_watermark;
            if !state.finished.remove(&next) {
                break;
            }
            state.low_watermark += 1;
        }
        if state.low_watermark > before {
            let watermark = state.low_watermark;
            state.committed.retain(|id| id.bundle >= watermark);
        }
    }

    /// Lowest bundle id that may still be open
    pub fn low_watermark(&self) -> u64 {
        self.state.lock().low_watermark
    }

    /// Number of group entries held for open bundles
    pub fn len(&self) -> usize {
        self.state.lock().committed.len()
    }

    /// True if no group entries are held
    pub fn is_empty(&self) -> bool {
        self.state.lock().committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabwrite_routing::InsertIdGenerator;

    fn tagged(ids: &mut InsertIdGenerator, destination: &str, n: usize) -> (TableRef, TaggedRow) {
        (
            TableRef::parse(destination).unwrap(),
            TaggedRow::new(json!({"n": n}), ids.next_id()),
        )
    }

    #[test]
    fn test_single_shard_groups_by_destination() {
        let mut ids = InsertIdGenerator::new();
        let rows = vec![
            tagged(&mut ids, "p:d.a", 0),
            tagged(&mut ids, "p:d.b", 1),
            tagged(&mut ids, "p:d.a", 2),
        ];

        let groups = Reshuffle::new(1).shuffle(7, rows);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id.key, ShardedKey::new("p:d.a", 0));
        assert_eq!(groups[0].id.bundle, 7);
        assert_eq!(groups[0].destination.canonical(), "p:d.a");
        let values: Vec<_> = groups[0].rows.iter().map(|r| r.row["n"].clone()).collect();
        assert_eq!(values, [json!(0), json!(2)]);
        assert!(!groups[0].prebatched);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_shards_stay_in_range_and_keep_every_row() {
        let mut ids = InsertIdGenerator::new();
        let rows: Vec<_> = (0..200).map(|n| tagged(&mut ids, "p:d.hot", n)).collect();

        let mut reshuffle = Reshuffle::with_seed(4, 42);
        let groups = reshuffle.shuffle(0, rows);

        assert!(groups.len() > 1);
        assert!(groups.iter().all(|g| g.id.key.shard < 4));
        assert_eq!(groups.iter().map(ShardGroup::len).sum::<usize>(), 200);
    }

    #[test]
    fn test_commit_log_is_exactly_once() {
        let log = CommitLog::new();
        log.expect(1, 1);
        let id = GroupId {
            bundle: 1,
            key: ShardedKey::new("p:d.a", 3),
        };

        assert!(!log.is_committed(&id));
        assert!(log.commit(id.clone()));
        assert!(!log.commit(id.clone()));
        assert!(log.is_committed(&id));
        assert_eq!(log.len(), 1);

        let other = GroupId { bundle: 2, ..id };
        assert!(!log.is_committed(&other));
    }

    #[test]
    fn test_commit_log_waits_for_every_part() {
        let log = CommitLog::new();
        log.expect(0, 2);
        let a = GroupId {
            bundle: 0,
            key: ShardedKey::new("p:d.a", 0),
        };
        log.commit(a.clone());

        log.finish(0);
        assert_eq!(log.low_watermark(), 0);
        assert_eq!(log.len(), 1);

        log.finish(0);
        assert_eq!(log.low_watermark(), 1);
        assert!(log.is_empty());
        assert!(log.is_committed(&a));
        assert!(!log.commit(a));
    }

    #[test]
    fn test_commit_log_advances_past_out_of_order_bundles() {
        let log = CommitLog::new();
        for bundle in 0..3 {
            log.expect(bundle, 1);
            log.commit(GroupId {
                bundle,
                key: ShardedKey::new("p:d.a", 0),
            });
        }

        log.finish(2);
        log.finish(1);
        assert_eq!(log.low_watermark(), 0);
        assert_eq!(log.len(), 3);

        log.finish(0);
        assert_eq!(log.low_watermark(), 3);
        assert!(log.is_empty());
    }

    #[test]
    fn test_commit_log_stays_bounded() {
        let log = CommitLog::new();
        for bundle in 0..10_000u64 {
            log.expect(bundle, 2);
            for shard in 0..2 {
                log.commit(GroupId {
                    bundle,
                    key: ShardedKey::new("p:d.a", shard),
                });
                log.finish(bundle);
            }
            assert!(log.len() <= 2);
        }
        assert_eq!(log.low_watermark(), 10_000);
        assert!(log.is_empty());
    }

    #[test]
    fn test_group_id_display() {
        let id = GroupId {
            bundle: 9,
            key: ShardedKey::new("p:d.a", 3),
        };
        assert_eq!(id.to_string(), "p:d.a#3@9");
    }
}
