//! Run ledger storage contract.

use tripline_types::period::Period;
use tripline_types::run::{PipelineKind, RunRecord};
use tripline_warehouse::error;

/// Append-only record of pipeline invocations, with the read-side queries
/// that derive what has already completed.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn RunLedger>`.
pub trait RunLedger: Send + Sync {
    /// Append one run record. Records are never updated or deleted.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](tripline_warehouse::WarehouseError) on
    /// storage failure.
    fn append(&self, record: &RunRecord) -> error::Result<()>;

    /// Highest period marked done (`SUCCESS` or `SKIPPED`) for `kind`, or
    /// `None` when no period has completed yet.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](tripline_warehouse::WarehouseError) on
    /// storage failure.
    fn last_completed_period(&self, kind: PipelineKind) -> error::Result<Option<Period>>;

    /// Whether the whole target year is already loaded: either a completed
    /// year-scoped full refresh, or all twelve months individually done.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](tripline_warehouse::WarehouseError) on
    /// storage failure.
    fn is_year_complete(&self) -> error::Result<bool>;

    /// Most recent runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](tripline_warehouse::WarehouseError) on
    /// storage failure.
    fn recent_runs(&self, limit: u32) -> error::Result<Vec<RunRecord>>;
}
