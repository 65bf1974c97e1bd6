//! Grouped counts: one shared series with a `group` label.
//!
//! Keys seen in earlier runs stay in the series even when the latest run no
//! longer returns them.

use super::{Job, JobContext, DATABASE_COLUMN, TABLE_COLUMN, VARIABLE_COLUMN};
use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use async_trait::async_trait;

pub const GROUP_COLUMN: &str = "gruppe";
pub const COUNT_COLUMN: &str = "antall";

/// Which source columns become labels next to `group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupLabels {
    /// `group, database, table, column`
    Full,
    /// `group, database`
    DatabaseOnly,
}

impl GroupLabels {
    fn names(&self) -> &'static [&'static str] {
        match self {
            GroupLabels::Full => &["group", "database", "table", "column"],
            GroupLabels::DatabaseOnly => &["group", "database"],
        }
    }

    fn columns(&self) -> &'static str {
        match self {
            GroupLabels::Full => "gruppe, datasett, tabell, variabel, antall",
            GroupLabels::DatabaseOnly => "gruppe, datasett, antall",
        }
    }
}

/// Reads a pre-aggregated `(gruppe, antall)` table into one gauge per group.
#[derive(Debug, Clone)]
pub struct GroupByJob {
    name: &'static str,
    source: SourceCoordinates,
    series: &'static str,
    help: &'static str,
    labels: GroupLabels,
}

impl GroupByJob {
    pub const GROUP_BY: &'static str = "preagg_group_by_and_count";
    pub const CITIZENSHIPS: &'static str = "preagg_num_citizenships";

    /// Row counts per group, `group_by{group,database,table,column}`.
    pub fn group_by() -> Self {
        Self {
            name: Self::GROUP_BY,
            source: SourceCoordinates::new("kvalitet", "metrics_count_group_by", ""),
            series: "group_by",
            help: "The number of rows by group",
            labels: GroupLabels::Full,
        }
    }

    /// Persons by number of citizenships, `ant_statsborgerskap{group,database}`.
    pub fn citizenships() -> Self {
        Self {
            name: Self::CITIZENSHIPS,
            source: SourceCoordinates::new("kvalitet", "metrics_antall_statsborgerskap", ""),
            series: "ant_statsborgerskap",
            help: "The number of persons with multiple citizenships",
            labels: GroupLabels::DatabaseOnly,
        }
    }

    pub fn with_source(mut self, source: SourceCoordinates) -> Self {
        self.source = source;
        self
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        format!(
            "SELECT {} FROM {table} WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})",
            self.labels.columns()
        )
    }
}

#[async_trait]
impl Job for GroupByJob {
    fn name(&self) -> &str {
        self.name
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(self.name, self.sql(&ctx.project)).await?;
        for row in &rows {
            let mut values = vec![row.text(GROUP_COLUMN)?, row.text(DATABASE_COLUMN)?];
            if self.labels == GroupLabels::Full {
                values.push(row.text(TABLE_COLUMN)?);
                values.push(row.text(VARIABLE_COLUMN)?);
            }
            ctx.set_gauge(
                self.series,
                self.help,
                self.labels.names(),
                &values,
                row.number(COUNT_COLUMN)?,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::datasource::mock::MockDataSource;
    use crate::datasource::Row;
    use crate::registry::{MetricRegistry, MetricValue};
    use std::sync::Arc;

    fn status_row(group: &str, count: i64) -> Row {
        Row::new()
            .with(GROUP_COLUMN, group)
            .with("datasett", "inndata")
            .with("tabell", "v_status")
            .with("variabel", "status")
            .with(COUNT_COLUMN, count)
    }

    #[tokio::test]
    async fn test_stale_groups_accumulate() {
        let source = MockDataSource::new().with_responses(
            GroupByJob::GROUP_BY,
            vec![
                vec![status_row("bosatt", 10), status_row("utflyttet", 3)],
                vec![status_row("bosatt", 11), status_row("doed", 2)],
            ],
        );
        let ctx = JobContext::new(
            Arc::new(MetricRegistry::new("freg_")),
            Arc::new(source),
            "p",
        );
        let job = GroupByJob::group_by();

        job.collect(&ctx).await.unwrap();
        job.collect(&ctx).await.unwrap();

        assert_eq!(ctx.registry.sample_count("freg_group_by"), Some(3));
        assert_eq!(
            ctx.registry
                .get("freg_group_by", &["bosatt", "inndata", "v_status", "status"]),
            Some(MetricValue::Gauge(11.0))
        );
        // Absent from the second run, value left as last seen.
        assert_eq!(
            ctx.registry
                .get("freg_group_by", &["utflyttet", "inndata", "v_status", "status"]),
            Some(MetricValue::Gauge(3.0))
        );
    }

    #[tokio::test]
    async fn test_citizenships_use_database_only() {
        let source = MockDataSource::new().with_rows(
            GroupByJob::CITIZENSHIPS,
            vec![
                Row::new()
                    .with(GROUP_COLUMN, "1")
                    .with("datasett", "inndata")
                    .with(COUNT_COLUMN, 4_000_000i64),
                Row::new()
                    .with(GROUP_COLUMN, "2")
                    .with("datasett", "inndata")
                    .with(COUNT_COLUMN, 90_000i64),
            ],
        );
        let ctx = JobContext::new(
            Arc::new(MetricRegistry::new("freg_")),
            Arc::new(source),
            "p",
        );

        GroupByJob::citizenships().collect(&ctx).await.unwrap();

        assert_eq!(
            ctx.registry.label_names("freg_ant_statsborgerskap").unwrap(),
            vec!["group", "database"]
        );
        assert_eq!(
            ctx.registry.get("freg_ant_statsborgerskap", &["2", "inndata"]),
            Some(MetricValue::Gauge(90_000.0))
        );
    }

    #[test]
    fn test_sql_selects_label_columns() {
        let sql = GroupByJob::citizenships().sql("proj");
        assert!(sql.starts_with(
            "SELECT gruppe, datasett, antall \
             FROM `proj.kvalitet.metrics_antall_statsborgerskap`"
        ));
    }
}
