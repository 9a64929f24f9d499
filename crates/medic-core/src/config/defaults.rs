//! Default values for configuration types.

use crate::config::types::{BackupConfig, Config, DiagnosticsConfig, MonitorConfig};
use std::path::PathBuf;

pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_BACKUPS_PER_TARGET: usize = 10;
pub const DEFAULT_STALENESS_HOURS: u64 = 24;
pub const DEFAULT_MAX_LOG_LINES: usize = 500;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;

impl Default for Config {
    fn default() -> Self {
        let medic_dir = match std::env::var_os("MEDIC_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => match dirs::home_dir() {
                Some(home) => home.join(".medic"),
                None => {
                    eprintln!(
                        "Warning: Could not find home directory. Set HOME environment variable. \
                        Using fallback directory."
                    );
                    std::env::temp_dir().join(".medic")
                }
            },
        };

        Self {
            medic_dir,
            log_level: std::env::var("MEDIC_LOG_LEVEL").unwrap_or("info".to_string()),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime config rooted at an explicit directory.
    pub fn with_dir(medic_dir: impl Into<PathBuf>) -> Self {
        Self {
            medic_dir: medic_dir.into(),
            log_level: "info".to_string(),
        }
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.medic_dir.join("backups")
    }

    pub fn history_file(&self) -> PathBuf {
        self.medic_dir.join("repair_history.jsonl")
    }
}

impl MonitorConfig {
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.unwrap_or(DEFAULT_MONITOR_INTERVAL_SECS)
    }
}

impl BackupConfig {
    pub fn max_per_target(&self) -> usize {
        self.max_per_target.unwrap_or(DEFAULT_MAX_BACKUPS_PER_TARGET)
    }

    pub fn staleness_hours(&self) -> u64 {
        self.staleness_hours.unwrap_or(DEFAULT_STALENESS_HOURS)
    }
}

impl DiagnosticsConfig {
    pub fn max_log_lines(&self) -> usize {
        self.max_log_lines.unwrap_or(DEFAULT_MAX_LOG_LINES)
    }

    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS))
    }
}
