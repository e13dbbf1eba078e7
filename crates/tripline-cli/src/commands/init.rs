use std::path::Path;

use anyhow::Result;

/// Execute the `init` command: create the warehouse tables.
pub fn execute(settings_path: &Path) -> Result<()> {
    let orchestrator = super::bootstrap(settings_path)?;
    orchestrator.init_tables()?;
    println!("Warehouse tables created.");
    Ok(())
}
