//! Sharded keys
//!
//! Fixed sharding spreads each destination over `num_shards` virtual
//! shards so a single hot table can be written in parallel. The shard is
//! drawn uniformly at random from `[0, num_shards)`.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::table::TableRef;

/// Destination key plus shard number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardedKey {
    /// Canonical destination
    pub destination: String,
    /// Shard number
    pub shard: u32,
}

impl ShardedKey {
    /// Key for `destination` on `shard`
    pub fn new(destination: impl Into<String>, shard: u32) -> Self {
        Self {
            destination: destination.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.destination, self.shard)
    }
}

/// Assigns random fixed shards
#[derive(Debug)]
pub struct FixedSharder {
    num_shards: u32,
    rng: StdRng,
}

impl FixedSharder {
    /// Sharder over `num_shards` shards (at least one)
    pub fn new(num_shards: u32) -> Self {
        Self {
            num_shards: num_shards.max(1),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sharder for reproducible runs
    pub fn with_seed(num_shards: u32, seed: u64) -> Self {
        Self {
            num_shards: num_shards.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of shards
    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    /// Draw a shard for `destination`
    pub fn assign(&mut self, destination: &TableRef) -> ShardedKey {
        let shard = self.rng.random_range(0..self.num_shards);
        ShardedKey::new(destination.canonical(), shard)
    }
}
