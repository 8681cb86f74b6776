//! Destination and schema resolution
//!
//! A destination is static, a function of the record, or a function of the
//! record plus side inputs. Schemas follow the same pattern keyed by the
//! resolved destination.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tabwrite_config::WriteConfig;

use crate::error::{Result, RoutingError};
use crate::schema::TableSchema;
use crate::table::TableRef;
use crate::Row;

/// Function mapping a row to its destination
pub type RecordFn = Arc<dyn Fn(&Row) -> Result<TableRef> + Send + Sync>;

/// Function mapping a row and side inputs to its destination
pub type SideInputFn = Arc<dyn Fn(&Row, &SideInputs) -> Result<TableRef> + Send + Sync>;

/// Function mapping a destination and side inputs to its schema
pub type SchemaFn =
    Arc<dyn Fn(&TableRef, &SideInputs) -> Result<Option<TableSchema>> + Send + Sync>;

/// Named auxiliary values available to resolver functions
#[derive(Debug, Clone, Default)]
pub struct SideInputs(Arc<BTreeMap<String, Value>>);

impl SideInputs {
    /// Wrap a map of named values
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(values))
    }

    /// Look up a side input by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True if no side inputs were supplied
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for SideInputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// Destinations
// =============================================================================

/// How a row's destination table is determined
#[derive(Clone)]
pub enum DestinationResolver {
    /// Every row goes to one table
    Static(TableRef),
    /// Destination computed from the row
    FunctionOfRecord(RecordFn),
    /// Destination computed from the row and side inputs
    FunctionWithSideInputs(SideInputFn, SideInputs),
}

impl DestinationResolver {
    /// Route every row to `table`
    pub fn fixed(table: TableRef) -> Self {
        Self::Static(table)
    }

    /// Route by a function of the row
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Row) -> Result<TableRef> + Send + Sync + 'static,
    {
        Self::FunctionOfRecord(Arc::new(f))
    }

    /// Route by a function of the row and side inputs
    pub fn with_side_inputs<F>(f: F, side_inputs: SideInputs) -> Self
    where
        F: Fn(&Row, &SideInputs) -> Result<TableRef> + Send + Sync + 'static,
    {
        Self::FunctionWithSideInputs(Arc::new(f), side_inputs)
    }

    /// Route by the table spec stored in a string field of each row
    pub fn by_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::from_fn(move |row| {
            let spec = row
                .get(&field)
                .and_then(Value::as_str)
                .ok_or_else(|| RoutingError::missing_route_field(&field))?;
            TableRef::parse(spec)
        })
    }

    /// Build the resolver described by the `[write]` section, if any
    ///
    /// Returns `None` when the configuration names no destination; the
    /// caller must then supply one programmatically.
    pub fn from_config(write: &WriteConfig) -> Result<Option<Self>> {
        if let Some(field) = &write.table_field {
            return Ok(Some(Self::by_field(field.clone())));
        }
        match &write.table {
            Some(table) => {
                let table = TableRef::parse_with(
                    table,
                    write.dataset.as_deref(),
                    write.project.as_deref(),
                )?;
                Ok(Some(Self::Static(table)))
            }
            None => Ok(None),
        }
    }

    /// True unless this is a static destination
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Static(_))
    }

    /// Resolve the destination of one row
    pub fn resolve(&self, row: &Row) -> Result<TableRef> {
        match self {
            Self::Static(table) => Ok(table.clone()),
            Self::FunctionOfRecord(f) => f(row),
            Self::FunctionWithSideInputs(f, side_inputs) => f(row, side_inputs),
        }
    }
}

impl fmt::Debug for DestinationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(table) => f.debug_tuple("Static").field(table).finish(),
            Self::FunctionOfRecord(_) => f.write_str("FunctionOfRecord(..)"),
            Self::FunctionWithSideInputs(_, side_inputs) => f
                .debug_tuple("FunctionWithSideInputs")
                .field(side_inputs)
                .finish(),
        }
    }
}

/// Resolves rows to fully qualified destinations
///
/// Applies the default project and rejects destinations that still have
/// none.
#[derive(Debug, Clone)]
pub struct DestinationRouter {
    resolver: DestinationResolver,
    default_project: Option<String>,
}

impl DestinationRouter {
    /// Create a router
    pub fn new(resolver: DestinationResolver, default_project: Option<String>) -> Self {
        Self {
            resolver,
            default_project,
        }
    }

    /// Underlying resolver
    pub fn resolver(&self) -> &DestinationResolver {
        &self.resolver
    }

    /// Fully qualified destination of `row`
    pub fn route(&self, row: &Row) -> Result<TableRef> {
        self.resolver
            .resolve(row)?
            .with_default_project(self.default_project.as_deref())
            .require_project()
    }
}

// =============================================================================
// Schemas
// =============================================================================

/// How a destination's creation schema is determined
#[derive(Clone, Default)]
pub enum SchemaResolver {
    /// No schema; creation relies on the storage service
    #[default]
    None,
    /// One schema for every destination
    Static(TableSchema),
    /// Schema computed from the destination and side inputs
    PerDestination(SchemaFn, SideInputs),
}

impl SchemaResolver {
    /// Schema computed per destination
    pub fn from_fn<F>(f: F, side_inputs: SideInputs) -> Self
    where
        F: Fn(&TableRef, &SideInputs) -> Result<Option<TableSchema>> + Send + Sync + 'static,
    {
        Self::PerDestination(Arc::new(f), side_inputs)
    }

    /// Build the resolver described by the `[write]` section
    pub fn from_config(write: &WriteConfig) -> Result<Self> {
        match &write.schema {
            Some(schema) => Ok(Self::Static(TableSchema::parse(schema)?)),
            None => Ok(Self::None),
        }
    }

    /// Schema for `table`, if any
    pub fn resolve(&self, table: &TableRef) -> Result<Option<TableSchema>> {
        match self {
            Self::None => Ok(None),
            Self::Static(schema) => Ok(Some(schema.clone())),
            Self::PerDestination(f, side_inputs) => f(table, side_inputs),
        }
    }
}

impl fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(schema) => f.debug_tuple("Static").field(schema).finish(),
            Self::PerDestination(_, side_inputs) => f
                .debug_tuple("PerDestination")
                .field(side_inputs)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_resolver() {
        let table = TableRef::parse("p:ds.t").unwrap();
        let resolver = DestinationResolver::fixed(table.clone());
        assert!(!resolver.is_dynamic());
        assert_eq!(resolver.resolve(&json!({"a": 1})).unwrap(), table);
    }

    #[test]
    fn test_function_of_record() {
        let resolver = DestinationResolver::from_fn(|row| {
            let kind = row["kind"].as_str().unwrap_or("other");
            TableRef::parse(&format!("p:ds.{}", kind))
        });
        assert!(resolver.is_dynamic());
        let table = resolver.resolve(&json!({"kind": "click"})).unwrap();
        assert_eq!(table.canonical(), "p:ds.click");
    }

    #[test]
    fn test_function_with_side_inputs() {
        let side: SideInputs = [("dataset".to_string(), json!("prod"))].into_iter().collect();
        let resolver = DestinationResolver::with_side_inputs(
            |row, side| {
                let dataset = side.get("dataset").and_then(Value::as_str).unwrap_or("dev");
                TableRef::new(Some("p"), dataset, row["t"].as_str().unwrap_or("t"))
            },
            side,
        );
        let table = resolver.resolve(&json!({"t": "events"})).unwrap();
        assert_eq!(table.canonical(), "p:prod.events");
    }

    #[test]
    fn test_by_field() {
        let resolver = DestinationResolver::by_field("dest");
        let table = resolver.resolve(&json!({"dest": "ds.t", "v": 1})).unwrap();
        assert_eq!(table.canonical(), "ds.t");

        let err = resolver.resolve(&json!({"v": 1})).unwrap_err();
        assert!(matches!(err, RoutingError::MissingRouteField { .. }));
    }

    #[test]
    fn test_router_applies_default_project() {
        let router = DestinationRouter::new(
            DestinationResolver::by_field("dest"),
            Some("acme".to_string()),
        );
        let table = router.route(&json!({"dest": "ds.t"})).unwrap();
        assert_eq!(table.canonical(), "acme:ds.t");

        let table = router.route(&json!({"dest": "own:ds.t"})).unwrap();
        assert_eq!(table.canonical(), "own:ds.t");
    }

    #[test]
    fn test_router_rejects_missing_project() {
        let router = DestinationRouter::new(DestinationResolver::by_field("dest"), None);
        let err = router.route(&json!({"dest": "ds.t"})).unwrap_err();
        assert!(matches!(err, RoutingError::MissingProject { .. }));
    }

    #[test]
    fn test_from_config() {
        let write = WriteConfig::default().with_table("p:ds.t");
        let resolver = DestinationResolver::from_config(&write).unwrap().unwrap();
        assert!(matches!(resolver, DestinationResolver::Static(_)));

        let write = WriteConfig::default().with_table_field("dest");
        let resolver = DestinationResolver::from_config(&write).unwrap().unwrap();
        assert!(resolver.is_dynamic());

        assert!(
            DestinationResolver::from_config(&WriteConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_from_config_split_destination() {
        let mut write = WriteConfig::default().with_table("events");
        write.dataset = Some("analytics".into());
        write.project = Some("acme".into());
        let resolver = DestinationResolver::from_config(&write).unwrap().unwrap();
        let table = resolver.resolve(&json!({})).unwrap();
        assert_eq!(table.canonical(), "acme:analytics.events");
    }

    #[test]
    fn test_schema_resolvers() {
        let table = TableRef::parse("p:ds.t").unwrap();
        assert!(SchemaResolver::None.resolve(&table).unwrap().is_none());

        let write = WriteConfig::default().with_schema("a:STRING");
        let resolver = SchemaResolver::from_config(&write).unwrap();
        assert_eq!(resolver.resolve(&table).unwrap().unwrap().fields.len(), 1);

        let resolver = SchemaResolver::from_fn(
            |table, _| Ok(Some(TableSchema::parse(&format!("{}_id:INTEGER", table.table()))?)),
            SideInputs::default(),
        );
        let schema = resolver.resolve(&table).unwrap().unwrap();
        assert_eq!(schema.fields[0].name, "t_id");
    }
}
