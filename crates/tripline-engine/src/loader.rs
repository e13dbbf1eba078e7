//! Staging ingestion with boundary-row idempotency checks.
//!
//! Row-count equality alone is a weak existence proxy, so a fetched batch
//! is matched against staging on its two temporal boundary rows: the rows
//! with minimum and maximum pickup timestamp, each fingerprinted across
//! several columns. Two point queries stand in for a full row-level diff.

use std::sync::Arc;

use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};

use tripline_types::period::Period;
use tripline_types::trips::{DROPOFF_AT, PICKUP_AT, TOTAL_AMOUNT, TRIP_DISTANCE, VENDOR_ID};
use tripline_warehouse::{SqlValue, Warehouse};

use crate::errors::PipelineError;
use crate::fetch::SourceFetcher;

/// Absolute tolerance for floating-point measures in the fingerprint.
/// The fetch/store round trip can perturb the low bits.
const MEASURE_TOLERANCE: f64 = 0.01;

/// The staging fingerprint of one fetched row: exact timestamps and
/// vendor, tolerance-matched measures.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRow {
    pub vendor_id: i64,
    pub pickup_at: NaiveDateTime,
    pub dropoff_at: NaiveDateTime,
    pub trip_distance: f64,
    pub total_amount: f64,
}

/// Fetches one period of source data and appends it to staging unless its
/// boundary rows show the batch was already ingested.
pub struct PeriodLoader {
    warehouse: Arc<dyn Warehouse>,
    fetcher: Arc<dyn SourceFetcher>,
    staging_table: String,
}

impl PeriodLoader {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        fetcher: Arc<dyn SourceFetcher>,
        staging_table: impl Into<String>,
    ) -> Self {
        Self {
            warehouse,
            fetcher,
            staging_table: staging_table.into(),
        }
    }

    /// Fetch `period` and append it to staging. Returns rows appended,
    /// 0 when both boundary rows already exist there.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures unchanged (retry is the caller's
    /// responsibility) and returns [`PipelineError::DataIntegrity`] when
    /// the source has no rows for the period.
    pub fn fetch_and_stage(&self, period: Period) -> Result<u64, PipelineError> {
        let batch = self.fetcher.fetch(period)?;
        if batch.num_rows() == 0 {
            return Err(PipelineError::DataIntegrity(format!(
                "no rows returned for {}",
                period.name()
            )));
        }
        tracing::info!(
            month = period.name(),
            rows = batch.num_rows(),
            "Fetched period batch"
        );

        if self.batch_already_staged(&batch) {
            tracing::info!(
                month = period.name(),
                "Both boundary rows present in staging, skipping upload"
            );
            return Ok(0);
        }

        let appended = self.warehouse.append_batch(&self.staging_table, &batch)?;
        tracing::info!(
            month = period.name(),
            rows = appended,
            "Appended batch to staging"
        );
        Ok(appended)
    }

    /// True when both boundary rows already exist in staging. Empty
    /// batches and lookup failures report "not staged", so a doubtful
    /// batch is loaded again rather than silently dropped.
    pub fn batch_already_staged(&self, batch: &RecordBatch) -> bool {
        let Some((min_row, max_row)) = boundary_rows(batch) else {
            return false;
        };
        let min_exists = self.row_exists(&min_row);
        let max_exists = self.row_exists(&max_row);
        if !(min_exists && max_exists) {
            tracing::info!(min_exists, max_exists, "Boundary row check: batch needs upload");
        }
        min_exists && max_exists
    }

    fn row_exists(&self, row: &BoundaryRow) -> bool {
        let filter = format!(
            "{PICKUP_AT} = ?1 AND {DROPOFF_AT} = ?2 AND {VENDOR_ID} = ?3 \
             AND ABS({TRIP_DISTANCE} - ?4) < ?5 AND ABS({TOTAL_AMOUNT} - ?6) < ?7"
        );
        let params = [
            SqlValue::from(row.pickup_at),
            SqlValue::from(row.dropoff_at),
            SqlValue::from(row.vendor_id),
            SqlValue::from(row.trip_distance),
            SqlValue::from(MEASURE_TOLERANCE),
            SqlValue::from(row.total_amount),
            SqlValue::from(MEASURE_TOLERANCE),
        ];
        match self
            .warehouse
            .row_count(&self.staging_table, Some((&filter, &params)))
        {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::error!(error = %err, "Boundary row lookup failed, assuming row is absent");
                false
            }
        }
    }
}

/// The rows with minimum and maximum pickup timestamp, or `None` when the
/// batch has no fingerprintable rows.
pub fn boundary_rows(batch: &RecordBatch) -> Option<(BoundaryRow, BoundaryRow)> {
    let mut min: Option<(NaiveDateTime, usize)> = None;
    let mut max: Option<(NaiveDateTime, usize)> = None;
    for idx in 0..batch.num_rows() {
        let Some(pickup) = timestamp_at(batch, PICKUP_AT, idx) else {
            continue;
        };
        if min.map_or(true, |(current, _)| pickup < current) {
            min = Some((pickup, idx));
        }
        if max.map_or(true, |(current, _)| pickup > current) {
            max = Some((pickup, idx));
        }
    }
    let (_, min_idx) = min?;
    let (_, max_idx) = max?;
    Some((extract_row(batch, min_idx)?, extract_row(batch, max_idx)?))
}

fn extract_row(batch: &RecordBatch, idx: usize) -> Option<BoundaryRow> {
    Some(BoundaryRow {
        vendor_id: int_at(batch, VENDOR_ID, idx)?,
        pickup_at: timestamp_at(batch, PICKUP_AT, idx)?,
        dropoff_at: timestamp_at(batch, DROPOFF_AT, idx)?,
        trip_distance: float_at(batch, TRIP_DISTANCE, idx)?,
        total_amount: float_at(batch, TOTAL_AMOUNT, idx)?,
    })
}

fn timestamp_at(batch: &RecordBatch, column: &str, idx: usize) -> Option<NaiveDateTime> {
    let col = batch.column_by_name(column)?;
    if col.is_null(idx) {
        return None;
    }
    let DataType::Timestamp(unit, _) = col.data_type() else {
        return None;
    };
    let any = col.as_any();
    let datetime = match unit {
        TimeUnit::Second => {
            DateTime::from_timestamp(any.downcast_ref::<TimestampSecondArray>()?.value(idx), 0)
        }
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(
            any.downcast_ref::<TimestampMillisecondArray>()?.value(idx),
        ),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(
            any.downcast_ref::<TimestampMicrosecondArray>()?.value(idx),
        ),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
            any.downcast_ref::<TimestampNanosecondArray>()?.value(idx),
        )),
    }?;
    Some(datetime.naive_utc())
}

fn int_at(batch: &RecordBatch, column: &str, idx: usize) -> Option<i64> {
    let col = batch.column_by_name(column)?;
    if col.is_null(idx) {
        return None;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Int64 => Some(any.downcast_ref::<Int64Array>()?.value(idx)),
        DataType::Int32 => Some(i64::from(any.downcast_ref::<Int32Array>()?.value(idx))),
        _ => None,
    }
}

fn float_at(batch: &RecordBatch, column: &str, idx: usize) -> Option<f64> {
    let col = batch.column_by_name(column)?;
    if col.is_null(idx) {
        return None;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Float64 => Some(any.downcast_ref::<Float64Array>()?.value(idx)),
        DataType::Float32 => Some(f64::from(any.downcast_ref::<Float32Array>()?.value(idx))),
        _ => None,
    }
}
