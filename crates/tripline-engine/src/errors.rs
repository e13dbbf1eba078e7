//! Categorised pipeline errors for retry decisions.

use tripline_warehouse::WarehouseError;

/// Error classes the pipeline distinguishes. Retry eligibility is a
/// property of the class: network and warehouse failures may pass on a
/// later attempt, data and configuration failures never will.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network or service failure that may succeed on retry.
    #[error("transient i/o error: {0}")]
    Transient(String),

    /// The data itself is wrong or missing; retrying cannot help.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Invalid or missing settings; fatal before any run begins.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rejected without invoking the operation: the circuit is open and
    /// its cooldown has not elapsed.
    #[error("circuit open after {failures} consecutive failures, cooling down for {cooldown_secs}s")]
    CircuitOpen { failures: u32, cooldown_secs: u64 },

    /// Warehouse storage failure.
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl PipelineError {
    /// Whether the retry executor may re-attempt the failed operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transient(_)
            | PipelineError::Warehouse(_)
            | PipelineError::CircuitOpen { .. } => true,
            PipelineError::DataIntegrity(_) | PipelineError::Configuration(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
