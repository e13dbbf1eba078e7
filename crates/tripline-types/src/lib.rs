//! Shared domain types for the tripline pipeline.
//!
//! Provides [`Period`](period::Period) handling, the month-name calendar,
//! run-ledger record types, and the canonical trip batch schema.

pub mod calendar;
pub mod period;
pub mod run;
pub mod trips;

pub use period::{InvalidPeriod, Period};
pub use run::{PipelineKind, RunRecord, RunStatus};
