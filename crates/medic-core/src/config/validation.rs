//! Configuration validation.

use crate::config::types::MedicConfig;
use crate::errors::ConfigError;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns `InvalidConfiguration` for zero intervals or retention counts,
/// rules whose pattern does not compile, and custom clients with empty names.
pub fn validate_config(config: &MedicConfig) -> Result<(), ConfigError> {
    if config.monitor.interval_secs == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "monitor.interval_secs must be greater than zero".to_string(),
        });
    }

    if config.backup.max_per_target == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "backup.max_per_target must be at least 1".to_string(),
        });
    }

    if config.diagnostics.max_log_lines == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "diagnostics.max_log_lines must be at least 1".to_string(),
        });
    }

    for rule in &config.diagnostics.rules {
        if let Err(e) = regex::Regex::new(&rule.pattern) {
            return Err(ConfigError::InvalidConfiguration {
                message: format!("Invalid rule pattern '{}': {}", rule.pattern, e),
            });
        }
    }

    for custom in &config.clients.custom {
        if custom.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                message: format!(
                    "Custom client at '{}' needs a name",
                    custom.config_path.display()
                ),
            });
        }
    }

    Ok(())
}
