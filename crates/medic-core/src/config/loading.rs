//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.medic/config.toml` (global user preferences)
//! 3. **Project config** - `./.medic/config.toml` (local overrides)
//! 4. **CLI arguments** - Command-line flags (highest priority)

use crate::config::types::{
    BackupConfig, ClientsConfig, Config, DiagnosticsConfig, MedicConfig, MonitorConfig,
};
use crate::config::validation::validate_config;
use std::fs;
use std::path::Path;

/// Check if an error is a "file not found" error.
fn is_file_not_found(e: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        return io_err.kind() == std::io::ErrorKind::NotFound;
    }

    let err_str = e.to_string();
    err_str.contains("No such file or directory") || err_str.contains("cannot find the path")
}

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if a file fails to parse or validation fails. Missing
/// config files are not errors.
pub fn load_hierarchy() -> Result<MedicConfig, Box<dyn std::error::Error>> {
    let mut config = MedicConfig::default();

    match load_user_config() {
        Ok(user_config) => config = merge_configs(config, user_config),
        Err(e) if !is_file_not_found(e.as_ref()) => return Err(e),
        Err(_) => {}
    }

    match load_project_config() {
        Ok(project_config) => config = merge_configs(config, project_config),
        Err(e) if !is_file_not_found(e.as_ref()) => return Err(e),
        Err(_) => {}
    }

    validate_config(&config)?;

    Ok(config)
}

/// Load the user configuration from `<medic_dir>/config.toml`.
fn load_user_config() -> Result<MedicConfig, Box<dyn std::error::Error>> {
    let config_path = Config::new().medic_dir.join("config.toml");
    load_config_file(&config_path)
}

/// Load the project configuration from ./.medic/config.toml.
fn load_project_config() -> Result<MedicConfig, Box<dyn std::error::Error>> {
    let config_path = std::env::current_dir()?.join(".medic").join("config.toml");
    load_config_file(&config_path)
}

/// Load a configuration file from the given path.
pub fn load_config_file(path: &Path) -> Result<MedicConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path).map_err(|e| -> Box<dyn std::error::Error> {
        if e.kind() == std::io::ErrorKind::NotFound {
            Box::new(e)
        } else {
            format!("Failed to read config file '{}': {}", path.display(), e).into()
        }
    })?;
    let config: MedicConfig = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
    Ok(config)
}

/// Merge two configurations, with override_config taking precedence.
///
/// Optional fields are replaced only when the override sets them. Rule lists
/// and custom clients are concatenated; disabled kinds are unioned.
pub fn merge_configs(base: MedicConfig, override_config: MedicConfig) -> MedicConfig {
    MedicConfig {
        monitor: MonitorConfig {
            interval_secs: override_config
                .monitor
                .interval_secs
                .or(base.monitor.interval_secs),
        },
        backup: BackupConfig {
            max_per_target: override_config
                .backup
                .max_per_target
                .or(base.backup.max_per_target),
            staleness_hours: override_config
                .backup
                .staleness_hours
                .or(base.backup.staleness_hours),
        },
        diagnostics: DiagnosticsConfig {
            max_log_lines: override_config
                .diagnostics
                .max_log_lines
                .or(base.diagnostics.max_log_lines),
            probe_timeout_ms: override_config
                .diagnostics
                .probe_timeout_ms
                .or(base.diagnostics.probe_timeout_ms),
            rules: {
                let mut merged = base.diagnostics.rules;
                merged.extend(override_config.diagnostics.rules);
                merged
            },
        },
        clients: ClientsConfig {
            disabled: {
                let mut merged = base.clients.disabled;
                for kind in override_config.clients.disabled {
                    if !merged.contains(&kind) {
                        merged.push(kind);
                    }
                }
                merged
            },
            custom: {
                let mut merged = base.clients.custom;
                for custom in override_config.clients.custom {
                    merged.retain(|c| c.config_path != custom.config_path);
                    merged.push(custom);
                }
                merged
            },
        },
    }
}
