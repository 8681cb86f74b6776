//! Writer errors
//!
//! Only local failures surface here. Row-level insert failures are retried
//! or dead-lettered and never become an `Err`.

use tabwrite_routing::RoutingError;

use super::client::ClientError;

/// Errors that abort the owning execution unit
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// Destination or schema could not be resolved
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Create-or-get failed
    #[error("failed to get or create table {table}: {source}")]
    TableCreation {
        /// Canonical table name
        table: String,
        /// Collaborator failure
        #[source]
        source: ClientError,
    },
}

impl WriterError {
    /// Create a TableCreation error
    pub fn table_creation(table: impl Into<String>, source: ClientError) -> Self {
        Self::TableCreation {
            table: table.into(),
            source,
        }
    }
}
