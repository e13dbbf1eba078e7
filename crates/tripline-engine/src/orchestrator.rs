//! Top-level pipeline state machine.
//!
//! Each run walks STAGING -> RAW -> CURATED -> AGGREGATED and terminates
//! in exactly one of SUCCESS / SKIPPED / FAILED. Errors are caught only
//! here: inner steps raise, and every outcome lands in the run ledger.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use tripline_state::RunLedger;
use tripline_types::period::{year_range_label, Period};
use tripline_types::run::{PipelineKind, RunRecord, RunStatus, FULL_YEAR_LABEL};
use tripline_warehouse::{schema, Warehouse};

use crate::breaker::CircuitBreaker;
use crate::config::types::Settings;
use crate::errors::PipelineError;
use crate::fetch::SourceFetcher;
use crate::layers::LayerMaintainer;
use crate::loader::PeriodLoader;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Terminal summary of one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub rows_loaded: u64,
    pub runtime_secs: f64,
    pub error: Option<String>,
}

impl RunOutcome {
    /// Skipped runs count as success: the data was already there.
    pub fn succeeded(&self) -> bool {
        self.status != RunStatus::Failed
    }
}

pub struct Orchestrator {
    settings: Settings,
    warehouse: Arc<dyn Warehouse>,
    ledger: Arc<dyn RunLedger>,
    loader: PeriodLoader,
    layers: LayerMaintainer,
    retry: RetryExecutor,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        warehouse: Arc<dyn Warehouse>,
        ledger: Arc<dyn RunLedger>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        let loader = PeriodLoader::new(
            warehouse.clone(),
            fetcher,
            settings.warehouse.staging_table.clone(),
        );
        let layers = LayerMaintainer::new(warehouse.clone(), &settings.warehouse, settings.year);
        let policy = RetryPolicy {
            max_attempts: settings.retry.max_attempts,
            base_delay: Duration::from_secs(settings.retry.base_delay_seconds),
        };
        let breaker = CircuitBreaker::new(
            settings.breaker.failure_threshold,
            Duration::from_secs(settings.breaker.cooldown_seconds),
        );
        let retry = RetryExecutor::with_breaker(policy, breaker);
        Self {
            settings,
            warehouse,
            ledger,
            loader,
            layers,
            retry,
        }
    }

    /// Create the staging, raw, and run-history tables. The curated and
    /// aggregated tables are created by their rebuild scripts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Warehouse`] on storage failure.
    pub fn init_tables(&self) -> Result<(), PipelineError> {
        let tables = &self.settings.warehouse;
        for script in [
            schema::create_staging_table(&tables.staging_table),
            schema::create_raw_table(&tables.raw_table),
            schema::create_ledger_table(&tables.ledger_table),
        ] {
            self.warehouse.replace_table(&script)?;
        }
        tracing::info!("Warehouse tables ready");
        Ok(())
    }

    /// Load the whole target year through every layer.
    pub fn run_full_refresh(&self) -> RunOutcome {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            pipeline = %PipelineKind::FullRefresh,
            year = self.settings.year,
            "Starting full refresh run"
        );

        match self.full_refresh_inner() {
            Ok(raw_rows) => {
                let status = if raw_rows == 0 {
                    tracing::info!("Full refresh complete: everything already in sync");
                    RunStatus::Skipped
                } else {
                    tracing::info!(rows = raw_rows, "Full refresh complete");
                    RunStatus::Success
                };
                self.record_outcome(
                    PipelineKind::FullRefresh,
                    None,
                    started_at,
                    start,
                    status,
                    raw_rows,
                    None,
                )
            }
            Err(err) => {
                tracing::error!(error = %err, "Full refresh failed");
                self.record_outcome(
                    PipelineKind::FullRefresh,
                    None,
                    started_at,
                    start,
                    RunStatus::Failed,
                    0,
                    Some(err.to_string()),
                )
            }
        }
    }

    /// Load one month: the explicit `target`, or the next month after the
    /// last completed one.
    pub fn run_incremental(&self, target: Option<Period>) -> RunOutcome {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            pipeline = %PipelineKind::Incremental,
            year = self.settings.year,
            "Starting incremental run"
        );

        let mut resolved: Option<Period> = None;
        let result = self.incremental_inner(target, &mut resolved);
        match result {
            Ok(None) => self.record_outcome(
                PipelineKind::Incremental,
                None,
                started_at,
                start,
                RunStatus::Skipped,
                0,
                None,
            ),
            Ok(Some(rows)) => {
                let status = if rows == 0 {
                    RunStatus::Skipped
                } else {
                    RunStatus::Success
                };
                self.record_outcome(
                    PipelineKind::Incremental,
                    resolved,
                    started_at,
                    start,
                    status,
                    rows,
                    None,
                )
            }
            Err(err) => {
                tracing::error!(error = %err, "Incremental run failed");
                self.record_outcome(
                    PipelineKind::Incremental,
                    resolved,
                    started_at,
                    start,
                    RunStatus::Failed,
                    0,
                    Some(err.to_string()),
                )
            }
        }
    }

    fn full_refresh_inner(&self) -> Result<u64, PipelineError> {
        // STAGING: every period in order; already-staged ones contribute 0.
        let mut staged_rows = 0u64;
        for period in Period::all() {
            let label = format!("Load {} to staging", period.name());
            staged_rows += self
                .retry
                .execute(&label, || self.loader.fetch_and_stage(period))?;
        }
        tracing::info!(rows = staged_rows, "Staging load complete");

        // RAW: rebuild only when out of sync.
        let raw_rows = if self.layers.needs_raw_rebuild() {
            self.layers.rebuild_raw()?
        } else {
            0
        };

        self.rebuild_derived_layers()?;
        Ok(raw_rows)
    }

    /// `Ok(None)` means there was nothing to do (year complete or no next
    /// period); `Ok(Some(rows))` is the raw-row delta of this run.
    fn incremental_inner(
        &self,
        target: Option<Period>,
        resolved: &mut Option<Period>,
    ) -> Result<Option<u64>, PipelineError> {
        if self.year_already_complete() {
            tracing::info!("Full year already loaded, skipping");
            return Ok(None);
        }

        let period = match target {
            Some(period) => period,
            None => match self.next_period() {
                Some(period) => period,
                None => return Ok(None),
            },
        };
        *resolved = Some(period);
        tracing::info!(month = period.name(), year = self.settings.year, "Processing period");

        let label = format!("Load {} to staging", period.name());
        let staged = self
            .retry
            .execute(&label, || self.loader.fetch_and_stage(period))?;
        if staged == 0 {
            tracing::info!(month = period.name(), "Period rows already present in staging");
        } else {
            tracing::info!(month = period.name(), rows = staged, "Period staged");
        }

        let delta = self.sync_raw_incremental()?;
        self.rebuild_derived_layers()?;
        Ok(Some(delta))
    }

    fn rebuild_derived_layers(&self) -> Result<(), PipelineError> {
        self.retry
            .execute("Rebuild curated layer", || self.layers.rebuild_curated())?;
        self.retry
            .execute("Rebuild aggregated layer", || self.layers.rebuild_aggregated())?;
        Ok(())
    }

    /// Raw sync for an incremental run: a full replace like the full
    /// refresh, but reporting only the delta attributable to this run.
    fn sync_raw_incremental(&self) -> Result<u64, PipelineError> {
        let before = self.layers.raw_row_count().unwrap_or_else(|err| {
            tracing::error!(error = %err, "Raw count unavailable before rebuild, assuming 0");
            0
        });
        if !self.layers.needs_raw_rebuild() {
            tracing::info!("Raw already in sync, no new rows this run");
            return Ok(0);
        }
        let after = self.layers.rebuild_raw()?;
        Ok(after.saturating_sub(before))
    }

    fn year_already_complete(&self) -> bool {
        self.ledger.is_year_complete().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Year-completion check failed, proceeding with load");
            false
        })
    }

    /// Next month to load: the one after the highest completed month.
    fn next_period(&self) -> Option<Period> {
        let last = self
            .ledger
            .last_completed_period(PipelineKind::Incremental)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Last-period lookup failed, starting from January");
                None
            });
        let Some(period) = last else {
            tracing::info!("No previous loads found, starting with January");
            return Some(Period::JANUARY);
        };
        match period.next() {
            Some(next) => {
                tracing::info!(last = period.name(), next = next.name(), "Resolved next period");
                Some(next)
            }
            None => {
                tracing::info!("All twelve months already loaded");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_outcome(
        &self,
        kind: PipelineKind,
        period: Option<Period>,
        started_at: DateTime<Utc>,
        start: Instant,
        status: RunStatus,
        rows_loaded: u64,
        error: Option<String>,
    ) -> RunOutcome {
        let runtime_secs = start.elapsed().as_secs_f64();
        let record = RunRecord {
            pipeline: kind,
            period_label: period
                .map(|p| p.name().to_string())
                .unwrap_or_else(|| FULL_YEAR_LABEL.to_string()),
            date_range: period
                .map(|p| p.date_range_label(self.settings.year))
                .unwrap_or_else(|| year_range_label(self.settings.year)),
            status,
            rows_loaded,
            started_at,
            runtime_secs,
            error_message: error.clone(),
        };
        if let Err(err) = self.ledger.append(&record) {
            // A metadata failure must never change the run outcome.
            tracing::warn!(error = %err, "Failed to record run in ledger");
        }
        tracing::info!(
            pipeline = kind.as_str(),
            status = status.as_str(),
            rows_loaded,
            runtime_secs,
            "Run finished"
        );
        RunOutcome {
            status,
            rows_loaded,
            runtime_secs,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripline_state::WarehouseLedger;
    use tripline_types::run::RunStatus;
    use tripline_warehouse::SqliteWarehouse;

    struct NoFetcher;

    impl SourceFetcher for NoFetcher {
        fn fetch(
            &self,
            _period: Period,
        ) -> Result<arrow::record_batch::RecordBatch, PipelineError> {
            Err(PipelineError::Transient("no source in this test".into()))
        }
    }

    fn test_settings() -> Settings {
        crate::config::parser::parse_settings_str(
            r#"
version: "1.0"
pipeline: trip_warehouse_test
year: 2024
warehouse:
  path: ":memory:"
source:
  base_url: https://data.example.com/trip-data
  file_template: yellow_tripdata_{year}-{month}.parquet
retry:
  max_attempts: 3
  base_delay_seconds: 0
"#,
        )
        .unwrap()
    }

    fn orchestrator() -> (Orchestrator, Arc<dyn RunLedger>) {
        let warehouse: Arc<dyn Warehouse> = Arc::new(SqliteWarehouse::in_memory().unwrap());
        let settings = test_settings();
        let ledger: Arc<dyn RunLedger> = Arc::new(WarehouseLedger::new(
            warehouse.clone(),
            settings.warehouse.ledger_table.clone(),
        ));
        let orchestrator =
            Orchestrator::new(settings, warehouse, ledger.clone(), Arc::new(NoFetcher));
        orchestrator.init_tables().unwrap();
        (orchestrator, ledger)
    }

    fn record_incremental(ledger: &Arc<dyn RunLedger>, period: Period, status: RunStatus) {
        ledger
            .append(&RunRecord {
                pipeline: PipelineKind::Incremental,
                period_label: period.name().to_string(),
                date_range: period.date_range_label(2024),
                status,
                rows_loaded: 10,
                started_at: Utc::now(),
                runtime_secs: 0.1,
                error_message: None,
            })
            .unwrap();
    }

    #[test]
    fn test_next_period_fresh_ledger_is_january() {
        let (orchestrator, _ledger) = orchestrator();
        assert_eq!(orchestrator.next_period(), Some(Period::JANUARY));
    }

    #[test]
    fn test_next_period_after_may_is_june() {
        let (orchestrator, ledger) = orchestrator();
        record_incremental(&ledger, Period::new(5).unwrap(), RunStatus::Success);
        assert_eq!(
            orchestrator.next_period(),
            Some(Period::new(6).unwrap())
        );
    }

    #[test]
    fn test_next_period_after_december_is_none() {
        let (orchestrator, ledger) = orchestrator();
        record_incremental(&ledger, Period::DECEMBER, RunStatus::Success);
        assert_eq!(orchestrator.next_period(), None);
    }

    #[test]
    fn test_next_period_counts_skipped_months() {
        let (orchestrator, ledger) = orchestrator();
        record_incremental(&ledger, Period::new(7).unwrap(), RunStatus::Skipped);
        assert_eq!(
            orchestrator.next_period(),
            Some(Period::new(8).unwrap())
        );
    }
}
