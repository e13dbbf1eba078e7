//! Canonical trip batch schema shared by the fetcher, the staging loader,
//! and the warehouse append path.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;

pub const VENDOR_ID: &str = "vendor_id";
pub const PICKUP_AT: &str = "pickup_at";
pub const DROPOFF_AT: &str = "dropoff_at";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TRIP_DISTANCE: &str = "trip_distance";
pub const TOTAL_AMOUNT: &str = "total_amount";

/// Schema of a fetched trip batch and of the staging table it lands in.
pub fn trip_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(VENDOR_ID, DataType::Int64, true),
        Field::new(PICKUP_AT, DataType::Timestamp(TimeUnit::Microsecond, None), true),
        Field::new(DROPOFF_AT, DataType::Timestamp(TimeUnit::Microsecond, None), true),
        Field::new(PASSENGER_COUNT, DataType::Int64, true),
        Field::new(TRIP_DISTANCE, DataType::Float64, true),
        Field::new(TOTAL_AMOUNT, DataType::Float64, true),
    ]))
}

/// A single trip row, used to assemble batches in tests and fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRow {
    pub vendor_id: i64,
    pub pickup_at: NaiveDateTime,
    pub dropoff_at: NaiveDateTime,
    pub passenger_count: i64,
    pub trip_distance: f64,
    pub total_amount: f64,
}

/// Assemble trip rows into a [`RecordBatch`] with the canonical schema.
pub fn rows_to_batch(rows: &[TripRow]) -> RecordBatch {
    let vendor_ids = Int64Array::from(rows.iter().map(|r| r.vendor_id).collect::<Vec<_>>());
    let pickups = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.pickup_at.and_utc().timestamp_micros())
            .collect::<Vec<_>>(),
    );
    let dropoffs = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.dropoff_at.and_utc().timestamp_micros())
            .collect::<Vec<_>>(),
    );
    let passengers = Int64Array::from(rows.iter().map(|r| r.passenger_count).collect::<Vec<_>>());
    let distances = Float64Array::from(rows.iter().map(|r| r.trip_distance).collect::<Vec<_>>());
    let amounts = Float64Array::from(rows.iter().map(|r| r.total_amount).collect::<Vec<_>>());

    RecordBatch::try_new(
        trip_schema(),
        vec![
            Arc::new(vendor_ids),
            Arc::new(pickups),
            Arc::new(dropoffs),
            Arc::new(passengers),
            Arc::new(distances),
            Arc::new(amounts),
        ],
    )
    .expect("arrays match the trip schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_schema_columns_in_order() {
        let schema = trip_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![VENDOR_ID, PICKUP_AT, DROPOFF_AT, PASSENGER_COUNT, TRIP_DISTANCE, TOTAL_AMOUNT]
        );
    }

    #[test]
    fn test_rows_to_batch_round_trip() {
        let rows = vec![
            TripRow {
                vendor_id: 1,
                pickup_at: ts("2024-01-05 08:00:00"),
                dropoff_at: ts("2024-01-05 08:20:00"),
                passenger_count: 2,
                trip_distance: 3.4,
                total_amount: 18.25,
            },
            TripRow {
                vendor_id: 2,
                pickup_at: ts("2024-01-06 09:00:00"),
                dropoff_at: ts("2024-01-06 09:45:00"),
                passenger_count: 1,
                trip_distance: 10.1,
                total_amount: 42.0,
            },
        ];
        let batch = rows_to_batch(&rows);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 6);

        let pickups = batch
            .column_by_name(PICKUP_AT)
            .unwrap()
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(
            pickups.value(0),
            ts("2024-01-05 08:00:00").and_utc().timestamp_micros()
        );
    }

    #[test]
    fn test_empty_batch() {
        let batch = rows_to_batch(&[]);
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.column(0).len(), 0);
    }
}
