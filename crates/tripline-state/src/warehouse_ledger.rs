//! Ledger implementation backed by the warehouse gateway.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::ledger::RunLedger;

use tripline_types::calendar;
use tripline_types::period::Period;
use tripline_types::run::{PipelineKind, RunRecord, RunStatus, FULL_YEAR_LABEL};
use tripline_warehouse::error::{Result, WarehouseError};
use tripline_warehouse::gateway::SQL_DATETIME_FORMAT;
use tripline_warehouse::{schema, SqlValue, Warehouse};

pub struct WarehouseLedger {
    warehouse: Arc<dyn Warehouse>,
    table: String,
}

impl WarehouseLedger {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: impl Into<String>) -> Self {
        Self {
            warehouse,
            table: table.into(),
        }
    }

    /// Create the run-history table when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] on storage failure.
    pub fn ensure_table(&self) -> Result<()> {
        self.warehouse
            .replace_table(&schema::create_ledger_table(&self.table))
    }

    /// Distinct month labels with a completed entry for `kind`.
    fn completed_month_labels(&self, kind: PipelineKind) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT period_label FROM {table}
             WHERE pipeline = ?1 AND status IN (?2, ?3) AND period_label != ?4",
            table = self.table
        );
        let params = [
            SqlValue::from(kind.as_str()),
            SqlValue::from(RunStatus::Success.as_str()),
            SqlValue::from(RunStatus::Skipped.as_str()),
            SqlValue::from(FULL_YEAR_LABEL),
        ];
        let rows = self.warehouse.query(&sql, &params)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.first().and_then(|cell| cell.as_str().map(String::from)))
            .collect())
    }
}

fn record_from_row(row: &[SqlValue]) -> Result<RunRecord> {
    let text = |idx: usize| -> Result<&str> {
        row.get(idx).and_then(SqlValue::as_str).ok_or_else(|| {
            WarehouseError::Decode(format!("missing text column {idx} in ledger row"))
        })
    };
    let kind_text = text(0)?;
    let pipeline = PipelineKind::parse(kind_text)
        .ok_or_else(|| WarehouseError::Decode(format!("unknown pipeline kind '{kind_text}'")))?;
    let status_text = text(3)?;
    let status = RunStatus::parse(status_text)
        .ok_or_else(|| WarehouseError::Decode(format!("unknown run status '{status_text}'")))?;
    let started_at = NaiveDateTime::parse_from_str(text(5)?, SQL_DATETIME_FORMAT)
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(RunRecord {
        pipeline,
        period_label: text(1)?.to_string(),
        date_range: text(2)?.to_string(),
        status,
        rows_loaded: row
            .get(4)
            .and_then(SqlValue::as_i64)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0),
        started_at,
        runtime_secs: row.get(6).and_then(SqlValue::as_f64).unwrap_or(0.0),
        error_message: row.get(7).and_then(SqlValue::as_str).map(String::from),
    })
}

impl RunLedger for WarehouseLedger {
    fn append(&self, record: &RunRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (
                pipeline, period_label, date_range, status,
                rows_loaded, started_at, runtime_secs, error_message
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            table = self.table
        );
        let params = [
            SqlValue::from(record.pipeline.as_str()),
            SqlValue::from(record.period_label.as_str()),
            SqlValue::from(record.date_range.as_str()),
            SqlValue::from(record.status.as_str()),
            SqlValue::from(record.rows_loaded),
            SqlValue::from(record.started_at.naive_utc()),
            SqlValue::from(record.runtime_secs),
            SqlValue::from(record.error_message.clone()),
        ];
        self.warehouse.execute(&sql, &params)?;
        tracing::info!(
            pipeline = record.pipeline.as_str(),
            period = record.period_label,
            status = record.status.as_str(),
            rows_loaded = record.rows_loaded,
            "Run recorded in ledger"
        );
        Ok(())
    }

    fn last_completed_period(&self, kind: PipelineKind) -> Result<Option<Period>> {
        let labels = self.completed_month_labels(kind)?;
        Ok(labels
            .iter()
            .filter_map(|label| calendar::month_number(label))
            .max())
    }

    fn is_year_complete(&self) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table}
             WHERE period_label = ?1 AND status IN (?2, ?3)",
            table = self.table
        );
        let params = [
            SqlValue::from(FULL_YEAR_LABEL),
            SqlValue::from(RunStatus::Success.as_str()),
            SqlValue::from(RunStatus::Skipped.as_str()),
        ];
        let rows = self.warehouse.query(&sql, &params)?;
        let full_year_runs = rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0);
        if full_year_runs > 0 {
            return Ok(true);
        }

        let months: std::collections::HashSet<Period> = self
            .completed_month_labels(PipelineKind::Incremental)?
            .iter()
            .filter_map(|label| calendar::month_number(label))
            .collect();
        Ok(months.len() == 12)
    }

    fn recent_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let sql = format!(
            "SELECT pipeline, period_label, date_range, status,
                    rows_loaded, started_at, runtime_secs, error_message
             FROM {table}
             ORDER BY id DESC
             LIMIT ?1",
            table = self.table
        );
        let rows = self.warehouse.query(&sql, &[SqlValue::from(i64::from(limit))])?;
        rows.iter().map(|row| record_from_row(row)).collect()
    }
}
