//! Table schemas
//!
//! Schemas are only used when a table has to be created. Two textual forms
//! are accepted: the compact `name:TYPE,name:TYPE` form, where every field is
//! `NULLABLE`, and the JSON form `{"fields": [{"name", "type", "mode"}]}`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

const DEFAULT_MODE: &str = "NULLABLE";

/// One column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    /// Column name
    pub name: String,

    /// Column type, upper-case (`STRING`, `INTEGER`, `RECORD`, ...)
    #[serde(rename = "type")]
    pub field_type: String,

    /// `NULLABLE`, `REQUIRED` or `REPEATED`
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Nested columns of a `RECORD`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableField>,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

impl TableField {
    /// Nullable scalar column
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into().to_ascii_uppercase(),
            mode: default_mode(),
            fields: Vec::new(),
        }
    }
}

/// Schema of a destination table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Top-level columns
    pub fields: Vec<TableField>,
}

impl TableSchema {
    /// Schema with the given columns
    pub fn new(fields: Vec<TableField>) -> Self {
        Self { fields }
    }

    /// Parse either textual form
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with('{') {
            return serde_json::from_str(s).map_err(|e| RoutingError::invalid_schema(e.to_string()));
        }
        Self::parse_compact(s)
    }

    fn parse_compact(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(RoutingError::invalid_schema("empty schema"));
        }

        let mut fields = Vec::new();
        for part in s.split(',') {
            let Some((name, field_type)) = part.split_once(':') else {
                return Err(RoutingError::invalid_schema(format!(
                    "expected name:TYPE, got '{}'",
                    part.trim()
                )));
            };
            let (name, field_type) = (name.trim(), field_type.trim());
            if name.is_empty() || field_type.is_empty() {
                return Err(RoutingError::invalid_schema(format!(
                    "expected name:TYPE, got '{}'",
                    part.trim()
                )));
            }
            fields.push(TableField::new(name, field_type));
        }

        Ok(Self { fields })
    }

    /// JSON form, as sent to a table-creation call
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Column names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl FromStr for TableSchema {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact() {
        let schema = TableSchema::parse("user:string, event:STRING,ts:TIMESTAMP").unwrap();
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[0], TableField::new("user", "STRING"));
        assert_eq!(schema.fields[2].field_type, "TIMESTAMP");
        assert!(schema.fields.iter().all(|f| f.mode == "NULLABLE"));
    }

    #[test]
    fn test_parse_json() {
        let schema = TableSchema::parse(
            r#"{"fields": [
                {"name": "user", "type": "STRING", "mode": "REQUIRED"},
                {"name": "attrs", "type": "RECORD", "mode": "REPEATED",
                 "fields": [{"name": "k", "type": "STRING"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.fields[0].mode, "REQUIRED");
        assert_eq!(schema.fields[1].fields[0].mode, "NULLABLE");
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["user", "attrs"]);
    }

    #[test]
    fn test_rejects_malformed_compact() {
        assert!(TableSchema::parse("user").is_err());
        assert!(TableSchema::parse("user:,a:INT").is_err());
        assert!(TableSchema::parse("").is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = TableSchema::parse(r#"{"fields": [{"name": "a"}]}"#).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidSchema(_)));
    }

    #[test]
    fn test_to_json_shape() {
        let schema = TableSchema::parse("a:INTEGER").unwrap();
        assert_eq!(
            schema.to_json(),
            serde_json::json!({"fields": [{"name": "a", "type": "INTEGER", "mode": "NULLABLE"}]})
        );
    }
}
