//! Configuration type definitions.
//!
//! # Example Configuration
//!
//! ```toml
//! [monitor]
//! interval_secs = 60
//!
//! [backup]
//! max_per_target = 10
//! staleness_hours = 24
//!
//! [diagnostics]
//! max_log_lines = 500
//! probe_timeout_ms = 3000
//!
//! [clients]
//! disabled = ["windsurf"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clients::ClientKind;
use crate::diagnostics::ErrorKind;

/// Runtime configuration.
///
/// Holds paths and settings derived from environment variables and system
/// defaults, not from config files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all medic data (default: ~/.medic)
    pub medic_dir: PathBuf,
    /// Log level for the application
    pub log_level: String,
}

/// Main configuration loaded from TOML config files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MedicConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub clients: ClientsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    /// Seconds between monitor cycles. Default: 60.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

/// Backup retention settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupConfig {
    /// Backups kept per (client, config file). Default: 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_target: Option<usize>,

    /// Age in hours after which the automatic safety backup is refreshed.
    /// Default: 24.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staleness_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiagnosticsConfig {
    /// Trailing lines read from each log file. Default: 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_log_lines: Option<usize>,

    /// Upper bound for any single isolation probe. Default: 3000ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,

    /// Extra classifier rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleConfig>,
}

/// A user-supplied log classification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Case-insensitive regex. The first capture group, if any, is the subject.
    pub pattern: String,
    pub kind: ErrorKind,
    /// Message template; `{subject}` is replaced by the first capture group.
    pub message: String,
    #[serde(default)]
    pub fixable: bool,
    /// Place the rule ahead of the built-in table instead of after it.
    #[serde(default)]
    pub prepend: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientsConfig {
    /// Built-in client kinds to skip during detection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<ClientKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<CustomClientConfig>,
}

/// A client that medic does not know about, configured by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomClientConfig {
    pub name: String,
    pub config_path: PathBuf,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Process names that indicate the client is running.
    #[serde(default)]
    pub process_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medic_config_serialization_roundtrip() {
        let mut config = MedicConfig::default();
        config.backup.max_per_target = Some(3);
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: MedicConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backup.max_per_target, Some(3));
    }

    #[test]
    fn test_rule_config_deserialize() {
        let toml_str = r#"
pattern = "quota (\\w+) exceeded"
kind = "NetworkError"
message = "Quota {subject} exceeded"
"#;
        let rule: RuleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(rule.kind, ErrorKind::NetworkError);
        assert!(!rule.fixable);
        assert!(!rule.prepend);
    }

    #[test]
    fn test_custom_client_deserialize() {
        let toml_str = r#"
[[clients.custom]]
name = "Team tool"
config_path = "/opt/team/mcp.json"
"#;
        let config: MedicConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.clients.custom.len(), 1);
        assert!(config.clients.custom[0].log_dir.is_none());
    }
}
