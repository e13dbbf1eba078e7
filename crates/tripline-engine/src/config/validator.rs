//! Semantic validation for parsed settings values.

use crate::config::types::Settings;
use crate::errors::PipelineError;

/// SQL identifiers cannot be bound as parameters, so table names are
/// restricted to a safe character set here instead.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate parsed settings. Returns `Ok(())` if valid, an error listing
/// all validation failures if not.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] listing every failure found.
pub fn validate_settings(settings: &Settings) -> Result<(), PipelineError> {
    let mut errors = Vec::new();

    if settings.version != "1.0" {
        errors.push(format!(
            "unsupported settings version '{}', expected '1.0'",
            settings.version
        ));
    }

    if settings.pipeline.trim().is_empty() {
        errors.push("pipeline name must not be empty".to_string());
    }

    if !(2000..=2100).contains(&settings.year) {
        errors.push(format!("year {} is outside the supported range", settings.year));
    }

    if settings.warehouse.path.trim().is_empty() {
        errors.push("warehouse.path must not be empty".to_string());
    }

    for (field, name) in [
        ("warehouse.staging_table", &settings.warehouse.staging_table),
        ("warehouse.raw_table", &settings.warehouse.raw_table),
        ("warehouse.curated_table", &settings.warehouse.curated_table),
        ("warehouse.aggregated_table", &settings.warehouse.aggregated_table),
        ("warehouse.ledger_table", &settings.warehouse.ledger_table),
    ] {
        if !is_identifier(name) {
            errors.push(format!("{field}: '{name}' is not a valid table identifier"));
        }
    }

    if settings.source.base_url.trim().is_empty() {
        errors.push("source.base_url must not be empty".to_string());
    }

    if !settings.source.file_template.contains("{month}") {
        errors.push("source.file_template must contain a {month} placeholder".to_string());
    }

    if settings.source.timeout_seconds == 0 {
        errors.push("source.timeout_seconds must be > 0".to_string());
    }

    if settings.retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be >= 1".to_string());
    }

    if settings.breaker.failure_threshold == 0 {
        errors.push("breaker.failure_threshold must be >= 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(errors.join("; ")))
    }
}
