//! Table references
//!
//! A destination is `project:dataset.table`. The project may be omitted and
//! filled in later from a default project; dataset and table may not.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RoutingError};

/// Fully or partially qualified destination table
///
/// Ordering and hashing follow the (project, dataset, table) triple, so two
/// references naming the same table compare equal.
///
/// # Example
///
/// ```
/// use tabwrite_routing::TableRef;
///
/// let table: TableRef = "acme:analytics.events".parse().unwrap();
/// assert_eq!(table.project(), Some("acme"));
/// assert_eq!(table.canonical(), "acme:analytics.events");
///
/// let partial: TableRef = "analytics.events".parse().unwrap();
/// let full = partial.with_default_project(Some("acme"));
/// assert_eq!(full, table);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    project: Option<String>,
    dataset: String,
    table: String,
}

impl TableRef {
    /// Build a reference from its parts, validating each identifier
    pub fn new(
        project: Option<&str>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let dataset = dataset.into();
        let table = table.into();

        if let Some(p) = project
            && p.is_empty()
        {
            return Err(RoutingError::invalid_table_spec(p, "empty project"));
        }
        if !is_dataset_id(&dataset) {
            return Err(RoutingError::invalid_table_spec(
                dataset,
                "dataset ids are letters, digits and underscores",
            ));
        }
        if !is_table_id(&table) {
            return Err(RoutingError::invalid_table_spec(
                table,
                "table ids are letters, digits, underscores and dashes",
            ));
        }

        Ok(Self {
            project: project.map(str::to_string),
            dataset,
            table,
        })
    }

    /// Parse `PROJECT:DATASET.TABLE` or `DATASET.TABLE`
    ///
    /// The project is everything before the last `:`, so domain-scoped
    /// projects such as `example.com:proj` are accepted.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (project, rest) = match spec.rsplit_once(':') {
            Some((project, rest)) => (Some(project), rest),
            None => (None, spec),
        };

        let Some((dataset, table)) = rest.split_once('.') else {
            return Err(RoutingError::invalid_table_spec(
                spec,
                "expected [PROJECT:]DATASET.TABLE",
            ));
        };

        Self::new(project, dataset, table).map_err(|_| {
            RoutingError::invalid_table_spec(spec, "expected [PROJECT:]DATASET.TABLE")
        })
    }

    /// Combine a table spec with separately supplied dataset and project
    ///
    /// With a dataset, `table` must be a bare table id. Without one, `table`
    /// is parsed as a full spec and `project` fills in a missing project.
    pub fn parse_with(table: &str, dataset: Option<&str>, project: Option<&str>) -> Result<Self> {
        match dataset {
            Some(dataset) => Self::new(project, dataset, table.trim()),
            None => Ok(Self::parse(table)?.with_default_project(project)),
        }
    }

    /// Fill in the project when this reference has none
    #[must_use]
    pub fn with_default_project(mut self, project: Option<&str>) -> Self {
        if self.project.is_none() {
            self.project = project.map(str::to_string);
        }
        self
    }

    /// Require a project, failing with `MissingProject` when absent
    pub fn require_project(self) -> Result<Self> {
        if self.project.is_none() {
            return Err(RoutingError::missing_project(self.canonical()));
        }
        Ok(self)
    }

    /// Project id, if known
    #[inline]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Dataset id
    #[inline]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Table id
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Canonical `project:dataset.table` string, used as the destination key
    pub fn canonical(&self) -> String {
        match &self.project {
            Some(project) => format!("{}:{}.{}", project, self.dataset, self.table),
            None => format!("{}.{}", self.dataset, self.table),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(project) = &self.project {
            write!(f, "{}:", project)?;
        }
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

impl FromStr for TableRef {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_dataset_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_table_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
