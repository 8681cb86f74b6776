//! Per-destination row buffers
//!
//! One batch per destination plus a running total across all of them.
//! Batches are kept in key order so flush-all visits destinations
//! deterministically.

use std::collections::BTreeMap;

use tabwrite_routing::{TableRef, TaggedRow};

/// Rows buffered for one destination
#[derive(Debug)]
pub(crate) struct DestinationBatch {
    pub(crate) table: TableRef,
    pub(crate) rows: Vec<TaggedRow>,
}

/// Buffers for every destination of one execution unit
#[derive(Debug, Default)]
pub(crate) struct RowBuffers {
    batches: BTreeMap<String, DestinationBatch>,
    total: usize,
}

impl RowBuffers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one row; returns the destination's batch length
    pub(crate) fn push(&mut self, key: &str, table: &TableRef, row: TaggedRow) -> usize {
        let batch = self.batch_mut(key, table);
        batch.rows.push(row);
        let len = batch.rows.len();
        self.total += 1;
        len
    }

    /// Append many rows to one destination
    pub(crate) fn extend(&mut self, key: &str, table: &TableRef, rows: Vec<TaggedRow>) {
        let added = rows.len();
        self.batch_mut(key, table).rows.extend(rows);
        self.total += added;
    }

    /// Remove and return a destination's batch
    pub(crate) fn take(&mut self, key: &str) -> Option<DestinationBatch> {
        let batch = self.batches.remove(key)?;
        self.total -= batch.rows.len();
        Some(batch)
    }

    /// Keys of all non-empty batches, in order
    pub(crate) fn keys(&self) -> Vec<String> {
        self.batches
            .iter()
            .filter(|(_, batch)| !batch.rows.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Rows buffered across all destinations
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub(crate) fn clear(&mut self) {
        self.batches.clear();
        self.total = 0;
    }

    fn batch_mut(&mut self, key: &str, table: &TableRef) -> &mut DestinationBatch {
        self.batches
            .entry(key.to_string())
            .or_insert_with(|| DestinationBatch {
                table: table.clone(),
                rows: Vec::new(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabwrite_routing::InsertId;

    fn row(n: u64) -> TaggedRow {
        TaggedRow::new(json!({"n": n}), InsertId::new(format!("id-{}", n)))
    }

    #[test]
    fn test_push_tracks_totals() {
        let a = TableRef::parse("p:d.a").unwrap();
        let b = TableRef::parse("p:d.b").unwrap();
        let mut buffers = RowBuffers::new();

        assert_eq!(buffers.push("p:d.a", &a, row(0)), 1);
        assert_eq!(buffers.push("p:d.a", &a, row(1)), 2);
        assert_eq!(buffers.push("p:d.b", &b, row(2)), 1);
        assert_eq!(buffers.total(), 3);
        assert_eq!(buffers.keys(), ["p:d.a", "p:d.b"]);
    }

    #[test]
    fn test_take_decrements_total() {
        let a = TableRef::parse("p:d.a").unwrap();
        let mut buffers = RowBuffers::new();
        buffers.extend("p:d.a", &a, vec![row(0), row(1)]);

        let batch = buffers.take("p:d.a").unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.table, a);
        assert!(buffers.is_empty());
        assert!(buffers.take("p:d.a").is_none());
    }

    #[test]
    fn test_clear() {
        let a = TableRef::parse("p:d.a").unwrap();
        let mut buffers = RowBuffers::new();
        buffers.push("p:d.a", &a, row(0));
        buffers.clear();
        assert!(buffers.is_empty());
        assert!(buffers.keys().is_empty());
    }
}
