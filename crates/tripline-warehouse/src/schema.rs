//! DDL scripts for the pipeline tables.
//!
//! Creation scripts are idempotent (`IF NOT EXISTS`); rebuild scripts drop
//! and recreate their target from the layer below it.

use tripline_types::trips::{
    DROPOFF_AT, PASSENGER_COUNT, PICKUP_AT, TOTAL_AMOUNT, TRIP_DISTANCE, VENDOR_ID,
};

fn trip_columns() -> String {
    format!(
        "{VENDOR_ID} INTEGER,\n    {PICKUP_AT} TEXT,\n    {DROPOFF_AT} TEXT,\n    {PASSENGER_COUNT} INTEGER,\n    {TRIP_DISTANCE} REAL,\n    {TOTAL_AMOUNT} REAL"
    )
}

/// Staging table: append-only landing zone for fetched batches.
pub fn create_staging_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {columns}\n);",
        columns = trip_columns()
    )
}

/// Raw table, initially empty; populated by [`rebuild_raw_script`].
pub fn create_raw_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {columns}\n);",
        columns = trip_columns()
    )
}

/// Run-history table backing the ledger.
pub fn create_ledger_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline TEXT NOT NULL,
    period_label TEXT NOT NULL,
    date_range TEXT NOT NULL,
    status TEXT NOT NULL,
    rows_loaded INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    runtime_secs REAL NOT NULL DEFAULT 0,
    error_message TEXT
);"
    )
}

/// Replace the raw table wholesale with staging's in-year rows.
///
/// A full replace rather than an append: staging may have received
/// out-of-order or corrected periods, and raw must always equal all of
/// staging's in-year rows, not the rows since the last rebuild.
pub fn rebuild_raw_script(raw: &str, staging: &str, year_start: &str, year_end: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {raw};
CREATE TABLE {raw} AS
SELECT * FROM {staging}
WHERE {PICKUP_AT} >= '{year_start}' AND {PICKUP_AT} < '{year_end}';"
    )
}

/// Recompute the curated table from raw: drops rows with missing or
/// inverted timestamps and non-positive measures, derives trip minutes.
pub fn rebuild_curated_script(curated: &str, raw: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {curated};
CREATE TABLE {curated} AS
SELECT {VENDOR_ID},
       {PICKUP_AT},
       {DROPOFF_AT},
       {PASSENGER_COUNT},
       {TRIP_DISTANCE},
       {TOTAL_AMOUNT},
       (julianday({DROPOFF_AT}) - julianday({PICKUP_AT})) * 1440.0 AS trip_minutes
FROM {raw}
WHERE {PICKUP_AT} IS NOT NULL
  AND {DROPOFF_AT} IS NOT NULL
  AND {DROPOFF_AT} >= {PICKUP_AT}
  AND {TRIP_DISTANCE} > 0
  AND {TOTAL_AMOUNT} > 0;"
    )
}

/// Recompute the aggregated table from curated: one row per month.
pub fn rebuild_aggregated_script(aggregated: &str, curated: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {aggregated};
CREATE TABLE {aggregated} AS
SELECT strftime('%Y-%m', {PICKUP_AT}) AS month,
       COUNT(*) AS trips,
       SUM({TOTAL_AMOUNT}) AS total_revenue,
       AVG({TRIP_DISTANCE}) AS avg_distance,
       AVG(trip_minutes) AS avg_minutes
FROM {curated}
GROUP BY month;"
    )
}
