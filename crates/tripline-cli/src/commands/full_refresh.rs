use std::path::Path;

use anyhow::Result;

/// Execute the `full-refresh` command: load the whole target year.
pub fn execute(settings_path: &Path) -> Result<()> {
    let orchestrator = super::bootstrap(settings_path)?;
    let outcome = orchestrator.run_full_refresh();
    super::print_outcome("full refresh", &outcome);
    if outcome.succeeded() {
        Ok(())
    } else {
        anyhow::bail!(
            "full refresh failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    }
}
