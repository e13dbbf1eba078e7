use std::path::Path;

use anyhow::Result;

/// Execute the `history` command: print the most recent runs.
pub fn execute(settings_path: &Path, limit: u32) -> Result<()> {
    let settings = super::load_settings(settings_path)?;
    let warehouse = super::open_warehouse(&settings)?;
    let ledger = super::open_ledger(&settings, warehouse);

    let runs = ledger.recent_runs(limit)?;
    if runs.is_empty() {
        println!("No pipeline runs recorded yet.");
        return Ok(());
    }

    println!("Last {} pipeline run(s):", runs.len());
    for run in &runs {
        println!(
            "  {} | {:<12} | {:<9} | {:<10} | {:>8} rows | {:.2}s",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.pipeline,
            run.period_label,
            run.status,
            run.rows_loaded,
            run.runtime_secs,
        );
        if let Some(error) = &run.error_message {
            println!("      error: {error}");
        }
    }
    Ok(())
}
