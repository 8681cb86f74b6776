//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
///
/// Every variant is raised before any record is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error - required field missing
    #[error("{section} is missing required field '{field}'")]
    MissingField {
        /// Config section (e.g., "write", "write.retry")
        section: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{section} has invalid {field}: {message}")]
    InvalidValue {
        /// Config section
        section: &'static str,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Option is valid elsewhere but not for streaming inserts
    #[error("{option} is not supported for streaming inserts: {reason}")]
    Unsupported {
        /// Offending option and value
        option: String,
        /// Why the streaming-insert engine rejects it
        reason: &'static str,
    },

    /// Destination given in more than one way
    #[error("ambiguous destination: {0}")]
    AmbiguousDestination(String),
}

impl ConfigError {
    /// Create a MissingField error
    pub fn missing_field(section: &'static str, field: &'static str) -> Self {
        Self::MissingField { section, field }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }

    /// Create an Unsupported error
    pub fn unsupported(option: impl Into<String>, reason: &'static str) -> Self {
        Self::Unsupported {
            option: option.into(),
            reason,
        }
    }

    /// Create an AmbiguousDestination error
    pub fn ambiguous_destination(message: impl Into<String>) -> Self {
        Self::AmbiguousDestination(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("write", "table");
        assert!(err.to_string().contains("write"));
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("write", "batch_size", "must be greater than 0");
        assert!(err.to_string().contains("batch_size"));
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_unsupported_error() {
        let err = ConfigError::unsupported("write_disposition=write_truncate", "append only");
        assert!(err.to_string().contains("write_truncate"));
        assert!(err.to_string().contains("streaming inserts"));
    }

    #[test]
    fn test_ambiguous_destination_error() {
        let err = ConfigError::ambiguous_destination("table 'd.t' with dataset 'd'");
        assert!(err.to_string().contains("ambiguous"));
        assert!(err.to_string().contains("d.t"));
    }
}
