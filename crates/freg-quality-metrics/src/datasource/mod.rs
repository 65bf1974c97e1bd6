//! Data sources.
//!
//! Jobs read aggregate statistics through the [`DataSource`] trait. The
//! production implementation is [`bigquery::BigQueryClient`]; tests use
//! [`mock::MockDataSource`].

pub mod bigquery;
pub mod mock;
pub mod row;
pub mod token;

pub use bigquery::BigQueryClient;
pub use row::{Cell, Row, TIMESTAMP_FORMAT};

use crate::errors::MetricsError;
use async_trait::async_trait;

/// A single query to run against a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Stable identifier, used in logs and by the mock to pick canned rows.
    pub name: String,
    /// Standard SQL text.
    pub sql: String,
}

impl QueryDescriptor {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Where a job reads from. `column` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceCoordinates {
    pub database: String,
    pub table: String,
    pub column: String,
}

impl SourceCoordinates {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Fully qualified table reference, e.g. `` `proj.kvalitet.metrics_count_group_by` ``.
    pub fn table_ref(&self, project: &str) -> String {
        format!("`{}.{}.{}`", project, self.database, self.table)
    }
}

/// Source of query result rows.
///
/// Implementations must be shareable across job tasks.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Run one query and return every result row.
    ///
    /// # Errors
    ///
    /// - `MetricsError::DataSource` when the query cannot be run or its
    ///   result cannot be read
    /// - `MetricsError::Authentication` when no credentials can be obtained
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<Row>, MetricsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_quotes_full_path() {
        let source = SourceCoordinates::new("kvalitet", "metrics_count_group_by", "");
        assert_eq!(
            source.table_ref("dev-freg-3896"),
            "`dev-freg-3896.kvalitet.metrics_count_group_by`"
        );
    }
}
