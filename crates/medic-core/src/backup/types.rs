use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clients::{ClientKind, HelperProcess, TargetKey};

/// Metadata of a point-in-time configuration snapshot.
///
/// `snapshot_path` holds a byte-exact copy of `source_config_path` as it was
/// at `created_at`. Records are never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub client_kind: ClientKind,
    pub source_config_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub helper_processes_snapshot: Vec<HelperProcess>,
}

impl BackupRecord {
    pub fn target(&self) -> TargetKey {
        TargetKey {
            kind: self.client_kind,
            config_path: self.source_config_path.clone(),
        }
    }

    /// First eight characters of the id, used in file names and tables.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Result of [`super::BackupStore::ensure_fresh_backup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredBackup {
    pub record: BackupRecord,
    /// False when an existing backup was fresh enough.
    pub created: bool,
}
