//! Storage-service collaborators
//!
//! The writer talks to the remote service through two narrow traits: one
//! for row inserts and one for table create-or-get. Transport, auth and
//! DDL live behind them.

use async_trait::async_trait;
use tabwrite_config::{CreateDisposition, WriteDisposition};
use tabwrite_routing::{InsertId, Row, TableRef, TableSchema};

/// Error for a single row of an insert call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position of the row in the request
    pub index: usize,
    /// Machine-readable reason, e.g. `invalid` or `backendError`
    pub reason: String,
    /// Human-readable message
    pub message: String,
}

impl RowError {
    /// Create a row error
    pub fn new(index: usize, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Result of one insert call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertResponse {
    /// True when every row was accepted
    pub passed: bool,
    /// Per-row errors; rows not listed were committed
    pub errors: Vec<RowError>,
}

impl InsertResponse {
    /// Every row accepted
    pub fn ok() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
        }
    }

    /// Some rows rejected
    pub fn with_errors(errors: Vec<RowError>) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
        }
    }
}

/// Failure of a whole collaborator call
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a per-row answer
    #[error("transport error ({reason}): {message}")]
    Transport {
        /// Reason used for retry classification
        reason: String,
        /// Detail
        message: String,
    },

    /// Destination table does not exist
    #[error("table {table} not found")]
    NotFound {
        /// Canonical table name
        table: String,
    },

    /// Service rejected the call
    #[error("api error ({reason}): {message}")]
    Api {
        /// Reason used for retry classification
        reason: String,
        /// Detail
        message: String,
    },
}

impl ClientError {
    /// Create a Transport error
    pub fn transport(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(table: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
        }
    }

    /// Create an Api error
    pub fn api(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Reason string, classified like a per-row reason
    pub fn reason(&self) -> &str {
        match self {
            Self::Transport { reason, .. } | Self::Api { reason, .. } => reason,
            Self::NotFound { .. } => "notFound",
        }
    }
}

/// Row-insert endpoint of the storage service
#[async_trait]
pub trait InsertClient: Send + Sync {
    /// Insert `rows` into `table`
    ///
    /// `insert_ids`, when given, has one entry per row. With
    /// `skip_invalid_rows` the service commits valid rows even when others
    /// in the same call are rejected.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
        insert_ids: Option<&[InsertId]>,
        skip_invalid_rows: bool,
    ) -> Result<InsertResponse, ClientError>;
}

/// Table create-or-get endpoint of the storage service
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Ensure `table` exists, creating it with `schema` when allowed
    ///
    /// Must be idempotent.
    async fn get_or_create_table(
        &self,
        table: &TableRef,
        schema: Option<&TableSchema>,
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_constructors() {
        assert!(InsertResponse::ok().passed);
        assert!(InsertResponse::with_errors(Vec::new()).passed);
        let response = InsertResponse::with_errors(vec![RowError::new(0, "invalid", "bad")]);
        assert!(!response.passed);
    }

    #[test]
    fn test_client_error_reason() {
        assert_eq!(ClientError::transport("timeout", "deadline").reason(), "timeout");
        assert_eq!(ClientError::not_found("p:d.t").reason(), "notFound");
        assert_eq!(ClientError::api("invalid", "nope").reason(), "invalid");
        assert!(ClientError::not_found("p:d.t").to_string().contains("p:d.t"));
    }
}
