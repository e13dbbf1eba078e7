//! Settings YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::types::Settings;
use crate::errors::PipelineError;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] listing every referenced
/// environment variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String, PipelineError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing.push(var_name.to_string());
            }
        }
    }

    if !missing.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "missing environment variable(s): {}",
            missing.join(", ")
        )));
    }

    Ok(result)
}

/// Parse a settings YAML string (after env var substitution).
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] when substitution fails or the
/// YAML is invalid.
pub fn parse_settings_str(yaml_str: &str) -> Result<Settings, PipelineError> {
    let substituted = substitute_env_vars(yaml_str)?;
    serde_yaml::from_str(&substituted)
        .map_err(|e| PipelineError::Configuration(format!("invalid settings YAML: {e}")))
}

/// Parse a settings YAML file.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] when the file cannot be read
/// or the YAML is invalid.
pub fn parse_settings(path: &Path) -> Result<Settings, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Configuration(format!(
            "failed to read settings file {}: {e}",
            path.display()
        ))
    })?;
    parse_settings_str(&content)
}
