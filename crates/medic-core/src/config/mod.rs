//! # Configuration System
//!
//! Hierarchical TOML configuration for medic.
//!
//! ## Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.medic/config.toml` (global user preferences)
//! 3. **Project config** - `./.medic/config.toml` (local overrides)
//! 4. **CLI arguments** - Command-line flags (highest priority)
//!
//! ## Usage Example
//!
//! ```toml
//! # ~/.medic/config.toml
//! [monitor]
//! interval_secs = 30
//!
//! [backup]
//! max_per_target = 5
//! staleness_hours = 12
//!
//! [[diagnostics.rules]]
//! pattern = "rate limit exceeded"
//! kind = "NetworkError"
//! message = "Upstream rate limit hit"
//!
//! [[clients.custom]]
//! name = "Team tool"
//! config_path = "/opt/team-tool/mcp.json"
//! ```

pub mod defaults;
pub mod loading;
pub mod types;
pub mod validation;

pub use types::{
    BackupConfig, ClientsConfig, Config, CustomClientConfig, DiagnosticsConfig, MedicConfig,
    MonitorConfig, RuleConfig,
};
pub use validation::validate_config;

impl MedicConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, Box<dyn std::error::Error>> {
        loading::load_hierarchy()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        validation::validate_config(self)
    }
}
