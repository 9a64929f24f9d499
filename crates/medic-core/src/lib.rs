//! medic-core: diagnose and repair the helper servers of desktop clients
//!
//! Finds the desktop clients installed on this host, reads the helper
//! servers they launch, classifies helper logs into typed errors, rates
//! health, probes for root causes and applies repairs under a backup and
//! rollback protocol.
//!
//! # Main Entry Points
//!
//! - [`engine`] - `status`, `diagnose`, `repair`, backups and history
//! - [`monitor`] - Periodic status publication to subscribers
//! - [`clients`] - Client inventory and helper-server configuration files
//! - [`diagnostics`] - Log classification
//! - [`repair`] - Planning and execution of fixes
//! - [`config`] - Configuration management

pub mod backup;
pub mod clients;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod events;
pub mod health;
pub mod isolation;
pub mod logging;
pub mod monitor;
pub mod platform;
pub mod process;
pub mod repair;

// Re-export commonly used types at crate root for convenience
pub use backup::{BackupError, BackupRecord, BackupStore};
pub use clients::{ClientKind, DetectionReport, HelperProcess, TargetClient, TargetKey};
pub use config::{Config, MedicConfig};
pub use diagnostics::{ClassifiedError, ErrorKind};
pub use engine::{DiagnoseReport, Engine, RepairRequest, RepairSummary};
pub use health::{ClientStatus, HealthLevel, SystemStatus};
pub use monitor::{Monitor, MonitorError, StatusSource, Subscription};
pub use platform::{HostContext, Platform};
pub use repair::{HistoryEntry, RepairOutcome, RepairReport};

// Re-export logging initialization
pub use logging::init_logging;
