pub mod full_refresh;
pub mod history;
pub mod incremental;
pub mod init;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use tripline_engine::config::{parse_settings, validate_settings, Settings};
use tripline_engine::fetch::{HttpParquetFetcher, SourceFetcher};
use tripline_engine::orchestrator::{Orchestrator, RunOutcome};
use tripline_state::{RunLedger, WarehouseLedger};
use tripline_warehouse::{SqliteWarehouse, Warehouse};

/// Load and validate settings; configuration problems are fatal here,
/// before any run begins.
pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    let settings = parse_settings(path)
        .with_context(|| format!("failed to load settings: {}", path.display()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

pub(crate) fn open_warehouse(settings: &Settings) -> Result<Arc<dyn Warehouse>> {
    let warehouse = SqliteWarehouse::open(Path::new(&settings.warehouse.path))
        .with_context(|| format!("failed to open warehouse: {}", settings.warehouse.path))?;
    Ok(Arc::new(warehouse))
}

pub(crate) fn open_ledger(
    settings: &Settings,
    warehouse: Arc<dyn Warehouse>,
) -> Arc<dyn RunLedger> {
    Arc::new(WarehouseLedger::new(
        warehouse,
        settings.warehouse.ledger_table.clone(),
    ))
}

/// Wire the full stack for a pipeline run.
pub(crate) fn bootstrap(path: &Path) -> Result<Orchestrator> {
    let settings = load_settings(path)?;
    let warehouse = open_warehouse(&settings)?;
    let ledger = open_ledger(&settings, warehouse.clone());
    let fetcher: Arc<dyn SourceFetcher> =
        Arc::new(HttpParquetFetcher::new(&settings.source, settings.year)?);
    tracing::info!(
        pipeline = settings.pipeline,
        year = settings.year,
        warehouse = settings.warehouse.path,
        "Pipeline configured"
    );
    Ok(Orchestrator::new(settings, warehouse, ledger, fetcher))
}

pub(crate) fn print_outcome(name: &str, outcome: &RunOutcome) {
    println!("Pipeline '{name}' finished: {}", outcome.status);
    println!("  Rows loaded: {}", outcome.rows_loaded);
    println!("  Runtime:     {:.2}s", outcome.runtime_secs);
    if let Some(error) = &outcome.error {
        println!("  Error:       {error}");
    }
}
