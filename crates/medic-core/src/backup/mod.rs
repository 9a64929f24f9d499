//! Backup Store.
//!
//! Timestamped snapshots of client configuration files with per-target
//! rotation and byte-exact restore.

pub mod errors;
pub mod store;
pub mod types;

pub use errors::BackupError;
pub use store::BackupStore;
pub use types::{BackupRecord, EnsuredBackup};
