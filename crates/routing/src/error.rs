//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors raised while resolving a row to its destination table
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Table spec does not match `[PROJECT:]DATASET.TABLE`
    #[error("invalid table spec '{spec}': {reason}")]
    InvalidTableSpec {
        /// The rejected spec
        spec: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Destination has no project and no default project was configured
    #[error("table '{table}' has no project and no default project is set")]
    MissingProject {
        /// Canonical form of the incomplete destination
        table: String,
    },

    /// Schema string could not be parsed
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Per-record routing field is absent or not a string
    #[error("row has no string field '{field}' naming its table")]
    MissingRouteField {
        /// Name of the routing field
        field: String,
    },

    /// User-supplied resolver failed
    #[error("destination resolver failed: {0}")]
    Resolver(String),
}

impl RoutingError {
    /// Create an InvalidTableSpec error
    #[inline]
    pub fn invalid_table_spec(spec: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidTableSpec {
            spec: spec.into(),
            reason,
        }
    }

    /// Create a MissingProject error
    #[inline]
    pub fn missing_project(table: impl Into<String>) -> Self {
        Self::MissingProject {
            table: table.into(),
        }
    }

    /// Create an InvalidSchema error
    #[inline]
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema(message.into())
    }

    /// Create a MissingRouteField error
    #[inline]
    pub fn missing_route_field(field: impl Into<String>) -> Self {
        Self::MissingRouteField {
            field: field.into(),
        }
    }

    /// Create a Resolver error
    #[inline]
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_table_spec_error() {
        let err = RoutingError::invalid_table_spec("events", "missing dataset");
        assert!(err.to_string().contains("events"));
        assert!(err.to_string().contains("missing dataset"));
    }

    #[test]
    fn test_missing_project_error() {
        let err = RoutingError::missing_project("ds.events");
        assert!(err.to_string().contains("ds.events"));
        assert!(err.to_string().contains("no default project"));
    }

    #[test]
    fn test_missing_route_field_error() {
        let err = RoutingError::missing_route_field("dest");
        assert!(err.to_string().contains("'dest'"));
    }
}
