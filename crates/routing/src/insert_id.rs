//! Insert ids
//!
//! Every row gets a dedup id of the form `<prefix>-<counter>` when it is
//! first seen. The prefix is a random UUID drawn per execution-unit bundle
//! and the counter restarts at zero with it. Retries resend the same id.

use std::fmt;

use uuid::Uuid;

use crate::Row;

/// Dedup id attached to a row for its whole lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsertId(String);

impl InsertId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for InsertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues insert ids for one bundle
#[derive(Debug)]
pub struct InsertIdGenerator {
    prefix: String,
    next: u64,
}

impl InsertIdGenerator {
    /// Generator with a fresh random prefix
    pub fn new() -> Self {
        Self::with_prefix(Uuid::new_v4().to_string())
    }

    /// Generator with a fixed prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    /// Prefix shared by every id from this generator
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of ids issued so far
    pub fn issued(&self) -> u64 {
        self.next
    }

    /// Next id in sequence
    pub fn next_id(&mut self) -> InsertId {
        let id = InsertId(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

impl Default for InsertIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A row paired with its insert id
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRow {
    /// Row payload
    pub row: Row,
    /// Dedup id; identical on every attempt
    pub insert_id: InsertId,
}

impl TaggedRow {
    /// Pair a row with its id
    pub fn new(row: Row, insert_id: InsertId) -> Self {
        Self { row, insert_id }
    }
}
