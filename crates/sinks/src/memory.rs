//! In-memory table store
//!
//! Implements both storage collaborators against process memory. Every call
//! is recorded, insert ids are deduplicated per table like the remote
//! service does, and insert attempts can be scripted to return row errors
//! or transport failures. Rows naming a column missing from the table's
//! schema are rejected with reason `invalid`.

use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tabwrite_config::{CreateDisposition, WriteDisposition};
use tabwrite_routing::{InsertId, Row, TableRef, TableSchema};

use crate::streaming::{ClientError, InsertClient, InsertResponse, RowError, TableClient};

/// One recorded insert call
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCall {
    /// Canonical table name
    pub table: String,
    /// Rows sent
    pub rows: Vec<Row>,
    /// Dedup ids sent, if any
    pub insert_ids: Option<Vec<InsertId>>,
    /// Whether partial commits were allowed
    pub skip_invalid_rows: bool,
}

/// One recorded create-or-get call
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    /// Canonical table name
    pub table: String,
    /// Schema supplied
    pub schema: Option<TableSchema>,
    /// Create disposition supplied
    pub create_disposition: CreateDisposition,
    /// Write disposition supplied
    pub write_disposition: WriteDisposition,
}

/// Scripted answer for the next insert call
#[derive(Debug, Clone)]
pub enum ScriptedInsert {
    /// Reject the listed rows and commit the others
    RowErrors(Vec<RowError>),
    /// Fail the whole call
    Transport(ClientError),
}

#[derive(Debug, Default)]
struct TableState {
    schema: Option<TableSchema>,
    rows: Vec<Row>,
    seen_ids: HashSet<InsertId>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, TableState>,
    inserts: Vec<InsertCall>,
    creates: Vec<CreateCall>,
    script: VecDeque<ScriptedInsert>,
    create_failure: Option<ClientError>,
    require_existing: bool,
}

/// Storage service backed by process memory
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    inner: Mutex<Inner>,
}

impl MemoryTableStore {
    /// Create an empty store that accepts inserts into any table
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts into tables that were never created
    pub fn require_existing_tables(self) -> Self {
        self.inner.lock().require_existing = true;
        self
    }

    /// Pre-create a table
    pub fn with_table(self, table: &TableRef, schema: Option<TableSchema>) -> Self {
        self.inner.lock().tables.insert(
            table.canonical(),
            TableState {
                schema,
                ..Default::default()
            },
        );
        self
    }

    /// Queue an answer for a future insert call
    pub fn script(&self, answer: ScriptedInsert) {
        self.inner.lock().script.push_back(answer);
    }

    /// Queue row errors for the next unscripted insert call
    pub fn fail_rows(&self, errors: Vec<RowError>) {
        self.script(ScriptedInsert::RowErrors(errors));
    }

    /// Queue a transport failure for the next unscripted insert call
    pub fn fail_transport(&self, reason: &str) {
        self.script(ScriptedInsert::Transport(ClientError::transport(
            reason,
            "scripted transport failure",
        )));
    }

    /// Make every create-or-get call fail with `error`
    pub fn fail_creates(&self, error: ClientError) {
        self.inner.lock().create_failure = Some(error);
    }

    /// Recorded insert calls, in order
    pub fn inserts(&self) -> Vec<InsertCall> {
        self.inner.lock().inserts.clone()
    }

    /// Recorded create-or-get calls, in order
    pub fn creates(&self) -> Vec<CreateCall> {
        self.inner.lock().creates.clone()
    }

    /// Committed rows of `table`
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Committed row count per table
    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        self.inner
            .lock()
            .tables
            .iter()
            .map(|(name, state)| (name.clone(), state.rows.len()))
            .collect()
    }

    /// Number of scripted answers not yet consumed
    pub fn pending_scripts(&self) -> usize {
        self.inner.lock().script.len()
    }
}

/// Reason for rejecting `row` against `schema`, if any
fn validate_row(row: &Row, schema: Option<&TableSchema>) -> Option<String> {
    let Some(object) = row.as_object() else {
        return Some("row is not a JSON object".to_string());
    };
    let schema = schema?;
    object
        .keys()
        .find(|key| !schema.fields.iter().any(|f| &f.name == *key))
        .map(|key| format!("no such field: {}", key))
}

#[async_trait]
impl InsertClient for MemoryTableStore {
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
        insert_ids: Option<&[InsertId]>,
        skip_invalid_rows: bool,
    ) -> Result<InsertResponse, ClientError> {
        let mut inner = self.inner.lock();
        let key = table.canonical();

        inner.inserts.push(InsertCall {
            table: key.clone(),
            rows: rows.to_vec(),
            insert_ids: insert_ids.map(<[InsertId]>::to_vec),
            skip_invalid_rows,
        });

        let mut errors = match inner.script.pop_front() {
            Some(ScriptedInsert::Transport(e)) => return Err(e),
            Some(ScriptedInsert::RowErrors(errors)) => errors,
            None => Vec::new(),
        };

        if inner.require_existing && !inner.tables.contains_key(&key) {
            return Err(ClientError::not_found(key));
        }

        let state = inner.tables.entry(key).or_default();
        for (index, row) in rows.iter().enumerate() {
            if errors.iter().any(|e| e.index == index) {
                continue;
            }
            if let Some(message) = validate_row(row, state.schema.as_ref()) {
                errors.push(RowError::new(index, "invalid", message));
            }
        }

        if !skip_invalid_rows && !errors.is_empty() {
            let failed: HashSet<usize> = errors.iter().map(|e| e.index).collect();
            for index in 0..rows.len() {
                if !failed.contains(&index) {
                    errors.push(RowError::new(index, "stopped", "batch contained invalid rows"));
                }
            }
            return Ok(InsertResponse::with_errors(errors));
        }

        for (index, row) in rows.iter().enumerate() {
            if errors.iter().any(|e| e.index == index) {
                continue;
            }
            if let Some(id) = insert_ids.and_then(|ids| ids.get(index))
                && !state.seen_ids.insert(id.clone())
            {
                continue;
            }
            state.rows.push(row.clone());
        }

        errors.sort_by_key(|e| e.index);
        Ok(InsertResponse::with_errors(errors))
    }
}

#[async_trait]
impl TableClient for MemoryTableStore {
    async fn get_or_create_table(
        &self,
        table: &TableRef,
        schema: Option<&TableSchema>,
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    ) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        let key = table.canonical();

        inner.creates.push(CreateCall {
            table: key.clone(),
            schema: schema.cloned(),
            create_disposition,
            write_disposition,
        });

        if let Some(error) = inner.create_failure.clone() {
            return Err(error);
        }

        if !inner.tables.contains_key(&key) {
            if create_disposition == CreateDisposition::CreateNever {
                return Err(ClientError::not_found(key));
            }
            inner.tables.insert(
                key,
                TableState {
                    schema: schema.cloned(),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }
}
