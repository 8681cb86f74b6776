//! Pipeline error types
//!
//! Errors that stop a pipeline run. Row-level insert failures never appear
//! here; they end up on the dead-letter channel.

use tabwrite_config::ConfigError;
use tabwrite_routing::RoutingError;
use tabwrite_sinks::streaming::WriterError;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A row could not be routed to a destination
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A writer aborted its execution unit
    #[error(transparent)]
    Writer(#[from] WriterError),

    /// Auto sharding was requested over a bounded input
    #[error("auto sharding is only available for unbounded input")]
    AutoShardingOnBoundedInput,

    /// No destination was configured or supplied
    #[error("no destination: set write.table or write.table_field, or supply a resolver")]
    MissingDestination,

    /// An execution unit stopped before the input was drained
    #[error("execution unit {unit} stopped: {reason}")]
    UnitStopped {
        /// Unit index
        unit: usize,
        /// What happened
        reason: String,
    },

    /// The dead-letter receiver was dropped while rows were still failing
    #[error("dead-letter channel closed with {pending} failed row(s) undelivered")]
    DeadLetterClosed {
        /// Rows that could not be delivered
        pending: usize,
    },
}

impl PipelineError {
    /// Create a unit stopped error
    pub fn unit_stopped(unit: usize, reason: impl Into<String>) -> Self {
        Self::UnitStopped {
            unit,
            reason: reason.into(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
