//! Source data acquisition: one parquet file per period over HTTP.

use std::time::Duration;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use tripline_types::period::Period;

use crate::config::types::SourceSettings;
use crate::errors::PipelineError;

/// Source-file acquisition seam. The loader only sees this trait; the
/// orchestrator decides which implementation to wire in.
pub trait SourceFetcher: Send + Sync {
    /// Fetch the batch of trips for one period.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transient`] for network failures and
    /// [`PipelineError::DataIntegrity`] for undecodable payloads.
    fn fetch(&self, period: Period) -> Result<RecordBatch, PipelineError>;
}

/// Downloads the period's parquet file and decodes it into one batch.
pub struct HttpParquetFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
    file_template: String,
    year: i32,
}

impl HttpParquetFetcher {
    /// Build a fetcher from source settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when the HTTP client
    /// cannot be constructed.
    pub fn new(settings: &SourceSettings, year: i32) -> Result<Self, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("failed to build http client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            file_template: settings.file_template.clone(),
            year,
        })
    }

    fn file_url(&self, period: Period) -> String {
        let file = self
            .file_template
            .replace("{year}", &self.year.to_string())
            .replace("{month}", &format!("{:02}", period.number()));
        format!("{}/{}", self.base_url, file)
    }
}

impl SourceFetcher for HttpParquetFetcher {
    fn fetch(&self, period: Period) -> Result<RecordBatch, PipelineError> {
        let url = self.file_url(period);
        tracing::info!(month = period.name(), url, "Downloading period file");

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| PipelineError::Transient(format!("download failed for {url}: {e}")))?;
        let body = response
            .bytes()
            .map_err(|e| PipelineError::Transient(format!("download truncated for {url}: {e}")))?;

        let batch = decode_parquet(body)?;
        tracing::info!(
            month = period.name(),
            rows = batch.num_rows(),
            "Downloaded period file"
        );
        Ok(batch)
    }
}

fn decode_parquet(payload: bytes::Bytes) -> Result<RecordBatch, PipelineError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(payload)
        .map_err(|e| PipelineError::DataIntegrity(format!("invalid parquet payload: {e}")))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| PipelineError::DataIntegrity(format!("invalid parquet payload: {e}")))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<Result<_, _>>()
        .map_err(|e| PipelineError::DataIntegrity(format!("failed to decode parquet: {e}")))?;
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    concat_batches(&schema, &batches)
        .map_err(|e| PipelineError::DataIntegrity(format!("failed to assemble batch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::ArrowWriter;
    use tripline_types::trips::{self, TripRow};

    fn settings() -> SourceSettings {
        SourceSettings {
            base_url: "https://example.com/trip-data/".into(),
            file_template: "yellow_tripdata_{year}-{month}.parquet".into(),
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_file_url_substitutes_year_and_padded_month() {
        let fetcher = HttpParquetFetcher::new(&settings(), 2024).unwrap();
        assert_eq!(
            fetcher.file_url(Period::new(3).unwrap()),
            "https://example.com/trip-data/yellow_tripdata_2024-03.parquet"
        );
        assert_eq!(
            fetcher.file_url(Period::new(11).unwrap()),
            "https://example.com/trip-data/yellow_tripdata_2024-11.parquet"
        );
    }

    #[test]
    fn test_decode_parquet_round_trip() {
        let rows = vec![TripRow {
            vendor_id: 1,
            pickup_at: chrono::NaiveDateTime::parse_from_str(
                "2024-01-05 08:00:00",
                "%Y-%m-%d %H:%M:%S",
            )
            .unwrap(),
            dropoff_at: chrono::NaiveDateTime::parse_from_str(
                "2024-01-05 08:20:00",
                "%Y-%m-%d %H:%M:%S",
            )
            .unwrap(),
            passenger_count: 2,
            trip_distance: 3.4,
            total_amount: 18.25,
        }];
        let batch = trips::rows_to_batch(&rows);

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let decoded = decode_parquet(bytes::Bytes::from(buf)).unwrap();
        assert_eq!(decoded.num_rows(), 1);
        assert_eq!(decoded.num_columns(), 6);
    }

    #[test]
    fn test_decode_parquet_rejects_garbage() {
        let result = decode_parquet(bytes::Bytes::from_static(b"not a parquet file"));
        assert!(matches!(result, Err(PipelineError::DataIntegrity(_))));
    }
}
