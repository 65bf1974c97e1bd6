//! Identity-number validity breakdowns.
//!
//! [`ValidIdentsJob`] republishes counts that were classified upstream.
//! [`IdentValidationJob`] pulls the raw numbers and classifies them here.

use super::{row_source_labels, Job, JobContext};
use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use crate::ident::{IdentKind, IdentTally};
use async_trait::async_trait;

/// `database, table, column, type`
const TYPED_LABELS: [&str; 4] = ["database", "table", "column", "type"];

/// `database, table, column, category`
const CATEGORY_LABELS: [&str; 4] = ["database", "table", "column", "category"];

/// Invalid-count series and the column suffix they are read from.
const INVALID_SERIES: [(&str, &str, &str); 3] = [
    ("ident_invalid_format", "invalid_format", "Idents with invalid format"),
    ("ident_invalid_date", "invalid_date", "Idents with invalid date"),
    (
        "ident_invalid_control_digit",
        "invalid_control",
        "Idents with invalid control digits",
    ),
];

/// Optional upstream category, published only when the table has it.
const FIRST_DIGIT_SERIES: (&str, &str, &str) = (
    "ident_invalid_first_digit",
    "invalid_first_digit",
    "Idents with invalid first digit",
);

/// Pre-aggregated fnr/dnr validity counts.
///
/// Each row carries `<type>_total_count` and `<type>_invalid_*` columns for
/// `type` in `fnr, dnr`. `ident_valid` is the total minus every invalid count.
#[derive(Debug, Clone)]
pub struct ValidIdentsJob {
    source: SourceCoordinates,
}

impl ValidIdentsJob {
    pub const NAME: &'static str = "preagg_valid_and_invalid_idents";

    pub fn new(source: SourceCoordinates) -> Self {
        Self { source }
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        format!("SELECT * FROM {table} WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})")
    }
}

impl Default for ValidIdentsJob {
    fn default() -> Self {
        Self::new(SourceCoordinates::new(
            "kvalitet",
            "metrics_count_valid_fnr_dnr",
            "",
        ))
    }
}

#[async_trait]
impl Job for ValidIdentsJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(Self::NAME, self.sql(&ctx.project)).await?;
        for row in &rows {
            let [database, table, column] = row_source_labels(row)?;
            for kind in [IdentKind::Fnr, IdentKind::Dnr] {
                let labels = [
                    database.as_str(),
                    table.as_str(),
                    column.as_str(),
                    kind.as_str(),
                ];
                let total = row.number(&format!("{}_total_count", kind))?;
                ctx.set_gauge(
                    "ident_total",
                    "The number of records with idents by type",
                    &TYPED_LABELS,
                    &labels,
                    total,
                )?;

                let mut invalid = 0.0;
                for (series, suffix, help) in INVALID_SERIES {
                    let count = row.number(&format!("{}_{}", kind, suffix))?;
                    invalid += count;
                    ctx.set_gauge(series, help, &TYPED_LABELS, &labels, count)?;
                }

                let (series, suffix, help) = FIRST_DIGIT_SERIES;
                let first_digit_column = format!("{}_{}", kind, suffix);
                if row.get(&first_digit_column).is_some() {
                    let count = row.number(&first_digit_column)?;
                    invalid += count;
                    ctx.set_gauge(series, help, &TYPED_LABELS, &labels, count)?;
                }

                ctx.set_gauge(
                    "ident_valid",
                    "Idents that passed every check",
                    &TYPED_LABELS,
                    &labels,
                    total - invalid,
                )?;
            }
        }
        Ok(())
    }
}

/// Classifies raw identity numbers in-process.
///
/// Publishes `ident_classified{database,table,column,category}` with one
/// sample per category, zero counts included.
#[derive(Debug, Clone)]
pub struct IdentValidationJob {
    source: SourceCoordinates,
}

impl IdentValidationJob {
    pub const NAME: &'static str = "ident_validation";

    /// Alias of the identity-number column in the query result.
    const IDENT_COLUMN: &'static str = "ident";

    pub fn new(source: SourceCoordinates) -> Self {
        Self { source }
    }

    fn sql(&self, project: &str) -> String {
        format!(
            "SELECT {} AS {} FROM {}",
            self.source.column,
            Self::IDENT_COLUMN,
            self.source.table_ref(project)
        )
    }
}

impl Default for IdentValidationJob {
    fn default() -> Self {
        Self::new(SourceCoordinates::new(
            "inndata",
            "v_identifikasjonsnummer",
            "folkeregisteridentifikator",
        ))
    }
}

#[async_trait]
impl Job for IdentValidationJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(Self::NAME, self.sql(&ctx.project)).await?;
        let idents = rows
            .iter()
            .map(|row| row.text(Self::IDENT_COLUMN))
            .collect::<Result<Vec<_>, _>>()?;
        let tally = IdentTally::from_idents(idents.iter().map(String::as_str), ctx.century_rule);

        for (category, count) in tally.categories() {
            ctx.set_gauge(
                "ident_classified",
                "Identity numbers by validation outcome",
                &CATEGORY_LABELS,
                &[
                    self.source.database.as_str(),
                    self.source.table.as_str(),
                    self.source.column.as_str(),
                    category,
                ],
                count as f64,
            )?;
        }
        Ok(())
    }
}
