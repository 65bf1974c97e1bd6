//! Total and distinct row counts per source column.

use super::{row_source_labels, Job, JobContext, SOURCE_LABELS};
use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use async_trait::async_trait;

pub const TOTAL_COLUMN: &str = "totalt";
pub const DISTINCT_COLUMN: &str = "distinkte";

/// Reads `kvalitet.metrics_count_total_and_distinct` and publishes
/// `total_rows` and `unique_rows` for every row.
#[derive(Debug, Clone)]
pub struct TotalAndDistinctJob {
    source: SourceCoordinates,
}

impl TotalAndDistinctJob {
    pub const NAME: &'static str = "preagg_total_and_distinct";

    pub fn new(source: SourceCoordinates) -> Self {
        Self { source }
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        format!(
            "SELECT datasett, tabell, variabel, totalt, distinkte \
             FROM {table} \
             WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})"
        )
    }
}

impl Default for TotalAndDistinctJob {
    fn default() -> Self {
        Self::new(SourceCoordinates::new(
            "kvalitet",
            "metrics_count_total_and_distinct",
            "",
        ))
    }
}

#[async_trait]
impl Job for TotalAndDistinctJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(Self::NAME, self.sql(&ctx.project)).await?;
        for row in &rows {
            let labels = row_source_labels(row)?;
            ctx.set_gauge(
                "total_rows",
                "The total number of rows",
                &SOURCE_LABELS,
                &labels,
                row.number(TOTAL_COLUMN)?,
            )?;
            ctx.set_gauge(
                "unique_rows",
                "The number of unique rows",
                &SOURCE_LABELS,
                &labels,
                row.number(DISTINCT_COLUMN)?,
            )?;
        }
        Ok(())
    }
}
