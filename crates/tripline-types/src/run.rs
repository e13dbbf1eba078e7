//! Run-ledger record types.

use chrono::{DateTime, Utc};

/// Ledger label used when a run covers the whole target year rather than
/// a single month.
pub const FULL_YEAR_LABEL: &str = "full year";

/// Which pipeline produced a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    FullRefresh,
    Incremental,
}

impl PipelineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::FullRefresh => "full_refresh",
            PipelineKind::Incremental => "incremental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full_refresh" => Some(PipelineKind::FullRefresh),
            "incremental" => Some(PipelineKind::Incremental),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(RunStatus::Success),
            "FAILED" => Some(RunStatus::Failed),
            "SKIPPED" => Some(RunStatus::Skipped),
            _ => None,
        }
    }

    /// Whether this status marks its period as done for resume purposes.
    /// A skipped month was found already loaded, so it counts.
    pub fn is_completed(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Skipped)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry in the run ledger. Written exactly once per
/// orchestrator invocation, never updated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub pipeline: PipelineKind,
    /// Month name, or [`FULL_YEAR_LABEL`] for year-scoped runs.
    pub period_label: String,
    pub date_range: String,
    pub status: RunStatus,
    pub rows_loaded: u64,
    pub started_at: DateTime<Utc>,
    pub runtime_secs: f64,
    pub error_message: Option<String>,
}
