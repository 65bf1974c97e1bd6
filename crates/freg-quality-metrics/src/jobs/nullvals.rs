//! DSF_SITUASJONSUTTAK null-value checks, one sample per column.

use super::{Job, JobContext};
use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use async_trait::async_trait;

pub const COLUMN_COLUMN: &str = "kolonne";

const COLUMN_LABELS: [&str; 1] = ["column"];

fn default_source() -> SourceCoordinates {
    SourceCoordinates::new("kvalitet", "qa_nullvalue_columns", "")
}

/// Null-value count and percentage of the latest run.
#[derive(Debug, Clone)]
pub struct NullvalsLatestJob {
    source: SourceCoordinates,
}

impl NullvalsLatestJob {
    pub const NAME: &'static str = "dsfsit_qa_nullvals_latest";

    pub fn new(source: SourceCoordinates) -> Self {
        Self { source }
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        format!(
            "SELECT kolonne, ant_nullvals, pct_nullvals FROM {table} \
             WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})"
        )
    }
}

impl Default for NullvalsLatestJob {
    fn default() -> Self {
        Self::new(default_source())
    }
}

#[async_trait]
impl Job for NullvalsLatestJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(Self::NAME, self.sql(&ctx.project)).await?;
        for row in &rows {
            let column = [row.text(COLUMN_COLUMN)?];
            ctx.set_gauge(
                "dsfsit_nullvals_latest",
                "DSF_SITUASJONSUTTAK: Num of rows with nullvalues",
                &COLUMN_LABELS,
                &column,
                row.number("ant_nullvals")?,
            )?;
            ctx.set_gauge(
                "dsfsit_nullvals_latest_pct",
                "DSF_SITUASJONSUTTAK: Percentage of rows with nullvalues",
                &COLUMN_LABELS,
                &column,
                row.number("pct_nullvals")?,
            )?;
        }
        Ok(())
    }
}

/// Change in null-value percentage since the previous run.
#[derive(Debug, Clone)]
pub struct NullvalsDiffJob {
    source: SourceCoordinates,
}

impl NullvalsDiffJob {
    pub const NAME: &'static str = "dsfsit_qa_nullvals_diff";

    pub fn new(source: SourceCoordinates) -> Self {
        Self { source }
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        format!(
            "WITH ranked AS (\
               SELECT kolonne, tidspunkt, \
                 pct_nullvals - LAG(pct_nullvals) OVER (PARTITION BY kolonne ORDER BY tidspunkt) AS pct_diff_last \
               FROM {table}\
             ) \
             SELECT kolonne, pct_diff_last FROM ranked \
             WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})"
        )
    }
}

impl Default for NullvalsDiffJob {
    fn default() -> Self {
        Self::new(default_source())
    }
}

#[async_trait]
impl Job for NullvalsDiffJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(Self::NAME, self.sql(&ctx.project)).await?;
        for row in &rows {
            ctx.set_gauge(
                "dsfsit_nullvals_diff_pct",
                "DSF_SITUASJONSUTTAK: Rise or drop in percentage of rows with nullvalues",
                &COLUMN_LABELS,
                &[row.text(COLUMN_COLUMN)?],
                row.number("pct_diff_last")?,
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
    use crate::datasource::{Cell, Row};
    use crate::registry::{MetricRegistry, MetricValue};
    use std::sync::Arc;

    fn context(source: MockDataSource) -> JobContext {
        JobContext::new(
            Arc::new(MetricRegistry::new("freg_")),
            Arc::new(source),
            "p",
        )
    }

    #[tokio::test]
    async fn test_latest_nullvals_per_column() {
        let ctx = context(MockDataSource::new().with_rows(
            NullvalsLatestJob::NAME,
            vec![
                Row::new()
                    .with(COLUMN_COLUMN, "fodselsdato")
                    .with("ant_nullvals", 12i64)
                    .with("pct_nullvals", 0.01),
                Row::new()
                    .with(COLUMN_COLUMN, "kjonn")
                    .with("ant_nullvals", 0i64)
                    .with("pct_nullvals", 0.0),
            ],
        ));

        NullvalsLatestJob::default().collect(&ctx).await.unwrap();

        assert_eq!(
            ctx.registry.get("freg_dsfsit_nullvals_latest", &["fodselsdato"]),
            Some(MetricValue::Gauge(12.0))
        );
        assert_eq!(
            ctx.registry.get("freg_dsfsit_nullvals_latest_pct", &["fodselsdato"]),
            Some(MetricValue::Gauge(0.01))
        );
        assert_eq!(ctx.registry.sample_count("freg_dsfsit_nullvals_latest"), Some(2));
    }

    #[tokio::test]
    async fn test_first_run_diff_is_nan() {
        let ctx = context(MockDataSource::new().with_rows(
            NullvalsDiffJob::NAME,
            vec![Row::new()
                .with(COLUMN_COLUMN, "kjonn")
                .with("pct_diff_last", Cell::Null)],
        ));

        NullvalsDiffJob::default().collect(&ctx).await.unwrap();

        let value = ctx
            .registry
            .get("freg_dsfsit_nullvals_diff_pct", &["kjonn"])
            .and_then(|v| v.as_gauge())
            .unwrap();
        assert!(value.is_nan());
    }

    #[test]
    fn test_diff_sql_uses_lag() {
        let sql = NullvalsDiffJob::default().sql("proj");
        assert!(sql.contains("LAG(pct_nullvals) OVER (PARTITION BY kolonne ORDER BY tidspunkt)"));
        assert!(sql.contains("`proj.kvalitet.qa_nullvalue_columns`"));
    }
}
