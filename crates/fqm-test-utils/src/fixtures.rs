//! Row fixtures shaped like the pre-aggregated quality tables.
//!
//! Column names match what the jobs read, so a fixture can be handed
//! straight to [`MockDataSource::with_rows`].
//!
//! [`MockDataSource::with_rows`]: freg_quality_metrics::datasource::mock::MockDataSource::with_rows

use chrono::{DateTime, TimeZone, Utc};
use freg_quality_metrics::datasource::Row;

/// Default source coordinates used by the fixtures.
pub const TEST_DATABASE: &str = "inndata";
pub const TEST_TABLE: &str = "v_identifikasjonsnummer";
pub const TEST_COLUMN: &str = "folkeregisteridentifikator";

/// Label values of the default source coordinates.
pub fn test_source_labels() -> [&'static str; 3] {
    [TEST_DATABASE, TEST_TABLE, TEST_COLUMN]
}

/// Fixed instant for reproducible timestamp tests (2024-03-01 06:00:00 UTC).
pub fn test_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0)
        .single()
        .expect("fixed test timestamp is valid")
}

fn source_row() -> Row {
    Row::new()
        .with("datasett", TEST_DATABASE)
        .with("tabell", TEST_TABLE)
        .with("variabel", TEST_COLUMN)
}

/// A `metrics_count_total_and_distinct` row.
pub fn total_and_distinct_row(total: i64, distinct: i64) -> Row {
    source_row()
        .with("totalt", total)
        .with("distinkte", distinct)
}

/// A `metrics_count_group_by` row.
pub fn group_by_row(group: &str, count: i64) -> Row {
    source_row().with("gruppe", group).with("antall", count)
}

/// A `metrics_antall_statsborgerskap` row.
pub fn citizenships_row(num_citizenships: &str, count: i64) -> Row {
    Row::new()
        .with("datasett", TEST_DATABASE)
        .with("gruppe", num_citizenships)
        .with("antall", count)
}

/// Invalid counts of one identity-number type.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidCounts {
    pub format: i64,
    pub date: i64,
    pub control: i64,
}

/// A `metrics_count_valid_fnr_dnr` row without first-digit columns.
pub fn valid_idents_row(
    fnr_total: i64,
    fnr_invalid: InvalidCounts,
    dnr_total: i64,
    dnr_invalid: InvalidCounts,
) -> Row {
    source_row()
        .with("fnr_total_count", fnr_total)
        .with("fnr_invalid_format", fnr_invalid.format)
        .with("fnr_invalid_date", fnr_invalid.date)
        .with("fnr_invalid_control", fnr_invalid.control)
        .with("dnr_total_count", dnr_total)
        .with("dnr_invalid_format", dnr_invalid.format)
        .with("dnr_invalid_date", dnr_invalid.date)
        .with("dnr_invalid_control", dnr_invalid.control)
}

/// A `metrics_latest_timestamp` row.
pub fn latest_timestamp_row(at: DateTime<Utc>) -> Row {
    source_row().with("latest_timestamp", at)
}

/// A single-row `MAX(...)` result.
pub fn max_timestamp_row(at: DateTime<Utc>) -> Row {
    Row::new().with("latest_timestamp", at)
}

/// A `qa_nullvalue_columns` latest-snapshot row.
pub fn nullvals_latest_row(column: &str, count: i64, pct: f64) -> Row {
    Row::new()
        .with("kolonne", column)
        .with("ant_nullvals", count)
        .with("pct_nullvals", pct)
}

/// A `qa_nullvalue_columns` change row.
pub fn nullvals_diff_row(column: &str, pct_diff: f64) -> Row {
    Row::new()
        .with("kolonne", column)
        .with("pct_diff_last", pct_diff)
}

/// A raw identity-number row for local validation.
pub fn ident_row(ident: &str) -> Row {
    Row::new().with("ident", ident)
}
