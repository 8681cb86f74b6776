//! Known-tables cache
//!
//! Canonical names of tables already confirmed or created. Shared by every
//! writer in the process and never evicted; the populating call is
//! idempotent, so a stale entry only surfaces as an insert failure.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Process-wide set of confirmed destination tables
#[derive(Debug, Default)]
pub struct KnownTables {
    tables: RwLock<HashSet<String>>,
}

impl KnownTables {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `table` was already confirmed
    pub fn contains(&self, table: &str) -> bool {
        self.tables.read().contains(table)
    }

    /// Record `table` as confirmed; returns false if it already was
    pub fn insert(&self, table: impl Into<String>) -> bool {
        self.tables.write().insert(table.into())
    }

    /// Number of confirmed tables
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// True if nothing has been confirmed yet
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_and_contains() {
        let cache = KnownTables::new();
        assert!(cache.is_empty());
        assert!(cache.insert("p:d.t"));
        assert!(!cache.insert("p:d.t"));
        assert!(cache.contains("p:d.t"));
        assert!(!cache.contains("p:d.other"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(KnownTables::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.insert(format!("p:d.t{}", i % 2)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
