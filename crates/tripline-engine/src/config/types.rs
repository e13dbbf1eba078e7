//! Settings file types with serde defaults.

use serde::{Deserialize, Serialize};

/// Immutable process-wide settings, loaded once at startup and passed into
/// constructors. No component reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    pub pipeline: String,
    /// Target year: only rows with an in-year pickup reach the raw layer.
    pub year: i32,
    pub warehouse: WarehouseSettings,
    pub source: SourceSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    /// Path of the SQLite database file.
    pub path: String,
    #[serde(default = "default_staging_table")]
    pub staging_table: String,
    #[serde(default = "default_raw_table")]
    pub raw_table: String,
    #[serde(default = "default_curated_table")]
    pub curated_table: String,
    #[serde(default = "default_aggregated_table")]
    pub aggregated_table: String,
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Base URL of the trip-file archive.
    pub base_url: String,
    /// File name pattern; `{year}` and `{month}` (zero-padded) are
    /// substituted per period.
    pub file_template: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_seconds")]
    pub base_delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

fn default_staging_table() -> String {
    "staging_trips".to_string()
}
fn default_raw_table() -> String {
    "raw_trips".to_string()
}
fn default_curated_table() -> String {
    "curated_trips".to_string()
}
fn default_aggregated_table() -> String {
    "monthly_trip_stats".to_string()
}
fn default_ledger_table() -> String {
    "run_history".to_string()
}
fn default_timeout_seconds() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_seconds() -> u64 {
    5
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_cooldown_seconds() -> u64 {
    60
}
