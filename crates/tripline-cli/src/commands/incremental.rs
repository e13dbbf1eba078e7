use std::path::Path;

use anyhow::Result;

use tripline_types::period::Period;

/// Execute the `incremental` command: load one month, explicit or resolved
/// from the run ledger.
pub fn execute(settings_path: &Path, month: Option<u32>) -> Result<()> {
    let target = month.map(Period::new).transpose()?;
    let orchestrator = super::bootstrap(settings_path)?;
    let outcome = orchestrator.run_incremental(target);
    super::print_outcome("incremental", &outcome);
    if outcome.succeeded() {
        Ok(())
    } else {
        anyhow::bail!(
            "incremental run failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    }
}
