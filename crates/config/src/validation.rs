//! Configuration validation
//!
//! Rejects, before any record is processed:
//! - dispositions streaming inserts cannot honour
//! - options that only apply to file loads
//! - schema auto-detection
//! - destinations specified in more than one way
//! - zero-sized thresholds and inverted backoff bounds
//!
//! Checks that depend on the input (auto sharding on bounded input) happen
//! where the input is known, in the pipeline.

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::write::{SCHEMA_AUTODETECT, WriteConfig, WriteDisposition, WriteMethod};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_write(&config.write)?;
    if config.metrics.enabled && config.metrics.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "interval",
            "must be greater than 0",
        ));
    }
    Ok(())
}

/// Validate the write section
pub fn validate_write(write: &WriteConfig) -> Result<()> {
    validate_method(write)?;
    validate_destination(write)?;
    validate_thresholds(write)?;
    validate_retry(write)?;
    Ok(())
}

fn validate_method(write: &WriteConfig) -> Result<()> {
    if write.method == WriteMethod::FileLoads {
        return Err(ConfigError::unsupported(
            "method=file_loads",
            "file loads are handled by a separate engine",
        ));
    }

    match write.write_disposition {
        WriteDisposition::WriteAppend => {}
        other => {
            return Err(ConfigError::unsupported(
                format!("write_disposition={}", other),
                "streaming inserts can only append",
            ));
        }
    }

    if write.triggering_frequency.is_some() {
        return Err(ConfigError::unsupported(
            "triggering_frequency",
            "it only applies to file loads",
        ));
    }

    if write
        .schema
        .as_deref()
        .is_some_and(|s| s.trim() == SCHEMA_AUTODETECT)
    {
        return Err(ConfigError::unsupported(
            "schema=SCHEMA_AUTODETECT",
            "schema auto-detection is only available for file loads",
        ));
    }

    Ok(())
}

fn validate_destination(write: &WriteConfig) -> Result<()> {
    if let Some(field) = write.table_field.as_deref() {
        if write.table.is_some() {
            return Err(ConfigError::ambiguous_destination(format!(
                "both table and table_field '{}' are set",
                field
            )));
        }
        if write.dataset.is_some() || write.project.is_some() {
            return Err(ConfigError::ambiguous_destination(format!(
                "table_field '{}' rows carry their own dataset and project",
                field
            )));
        }
        if field.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "write",
                "table_field",
                "must not be empty",
            ));
        }
        return Ok(());
    }

    let Some(table) = write.table.as_deref() else {
        if write.dataset.is_some() || write.project.is_some() {
            return Err(ConfigError::missing_field("write", "table"));
        }
        // Dynamic destinations are supplied programmatically.
        return Ok(());
    };

    if table.trim().is_empty() {
        return Err(ConfigError::invalid_value("write", "table", "must not be empty"));
    }

    if let Some(dataset) = write.dataset.as_deref()
        && (table.contains('.') || table.contains(':'))
    {
        return Err(ConfigError::ambiguous_destination(format!(
            "table '{}' is qualified but dataset '{}' is also set",
            table, dataset
        )));
    }

    if let Some(project) = write.project.as_deref()
        && table.contains(':')
    {
        return Err(ConfigError::ambiguous_destination(format!(
            "table '{}' names a project but project '{}' is also set",
            table, project
        )));
    }

    if write.project.is_some() && write.dataset.is_none() && !table.contains('.') {
        return Err(ConfigError::missing_field("write", "dataset"));
    }

    Ok(())
}

fn validate_thresholds(write: &WriteConfig) -> Result<()> {
    if write.batch_size == Some(0) {
        return Err(ConfigError::invalid_value(
            "write",
            "batch_size",
            "must be greater than 0",
        ));
    }
    if write.max_buffered_rows == 0 {
        return Err(ConfigError::invalid_value(
            "write",
            "max_buffered_rows",
            "must be greater than 0",
        ));
    }
    if write.num_shards == 0 {
        return Err(ConfigError::invalid_value(
            "write",
            "num_shards",
            "must be greater than 0",
        ));
    }
    if write.with_auto_sharding && write.max_buffering_duration.is_zero() {
        return Err(ConfigError::invalid_value(
            "write",
            "max_buffering_duration",
            "must be greater than 0 with auto sharding",
        ));
    }
    if write.runtime.workers == 0 {
        return Err(ConfigError::invalid_value(
            "write.runtime",
            "workers",
            "must be greater than 0",
        ));
    }
    if write.runtime.bundle_size == 0 {
        return Err(ConfigError::invalid_value(
            "write.runtime",
            "bundle_size",
            "must be greater than 0",
        ));
    }
    if write.runtime.queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "write.runtime",
            "queue_size",
            "must be greater than 0",
        ));
    }
    if write.runtime.bundle_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "write.runtime",
            "bundle_timeout",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_retry(write: &WriteConfig) -> Result<()> {
    if write.retry.initial_delay > write.retry.max_delay {
        return Err(ConfigError::invalid_value(
            "write.retry",
            "initial_delay",
            format!(
                "{:?} exceeds max_delay {:?}",
                write.retry.initial_delay, write.retry.max_delay
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::{CreateDisposition, WriteDisposition};
    use std::time::Duration;

    fn valid() -> WriteConfig {
        WriteConfig::default().with_table("proj:ds.events")
    }

    #[test]
    fn test_valid_static_destination() {
        assert!(validate_write(&valid()).is_ok());
    }

    #[test]
    fn test_dynamic_destination_has_no_table() {
        assert!(validate_write(&WriteConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_truncate_and_empty() {
        for disposition in [WriteDisposition::WriteTruncate, WriteDisposition::WriteEmpty] {
            let mut config = valid();
            config.write_disposition = disposition;
            let err = validate_write(&config).unwrap_err();
            assert!(matches!(err, ConfigError::Unsupported { .. }));
            assert!(err.to_string().contains(disposition.as_str()));
        }
    }

    #[test]
    fn test_create_never_is_allowed() {
        let config = valid().with_create_disposition(CreateDisposition::CreateNever);
        assert!(validate_write(&config).is_ok());
    }

    #[test]
    fn test_rejects_schema_autodetect() {
        let config = valid().with_schema(SCHEMA_AUTODETECT);
        let err = validate_write(&config).unwrap_err();
        assert!(err.to_string().contains("SCHEMA_AUTODETECT"));
    }

    #[test]
    fn test_rejects_file_load_options() {
        let mut config = valid();
        config.method = WriteMethod::FileLoads;
        assert!(validate_write(&config).is_err());

        let mut config = valid();
        config.triggering_frequency = Some(Duration::from_secs(60));
        assert!(validate_write(&config).is_err());
    }

    #[test]
    fn test_rejects_ambiguous_dataset() {
        let mut config = valid();
        config.dataset = Some("other".into());
        let err = validate_write(&config).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDestination(_)));
    }

    #[test]
    fn test_rejects_ambiguous_project() {
        let mut config = valid();
        config.project = Some("other".into());
        let err = validate_write(&config).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDestination(_)));
    }

    #[test]
    fn test_split_destination() {
        let mut config = WriteConfig::default().with_table("events");
        config.dataset = Some("ds".into());
        config.project = Some("proj".into());
        assert!(validate_write(&config).is_ok());
    }

    #[test]
    fn test_table_field_routing() {
        let config = WriteConfig::default().with_table_field("dest");
        assert!(validate_write(&config).is_ok());

        let config = valid().with_table_field("dest");
        let err = validate_write(&config).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDestination(_)));
    }

    #[test]
    fn test_dataset_without_table() {
        let mut config = WriteConfig::default();
        config.dataset = Some("ds".into());
        let err = validate_write(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "table", .. }));
    }

    #[test]
    fn test_rejects_zero_thresholds() {
        assert!(validate_write(&valid().with_batch_size(0)).is_err());
        assert!(validate_write(&valid().with_max_buffered_rows(0)).is_err());
        assert!(validate_write(&valid().with_num_shards(0)).is_err());
        assert!(validate_write(&valid().with_workers(0)).is_err());

        let mut write = valid();
        write.runtime.bundle_timeout = Duration::ZERO;
        assert!(validate_write(&write).is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let config =
            valid().with_retry_delays(Duration::from_secs(10), Duration::from_secs(1));
        assert!(validate_write(&config).is_err());
    }
}
