use crate::errors::MedicError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Configuration file not found at '{}'", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Backup '{id}' not found")]
    NotFound { id: String },

    #[error("Snapshot for backup '{id}' is missing at '{}'", path.display())]
    SnapshotMissing { id: String, path: PathBuf },

    #[error("Another operation is in progress for {target}")]
    TargetBusy { target: String },

    #[error("Backup index at '{}' is corrupt: {message}", path.display())]
    IndexCorrupt { path: PathBuf, message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl MedicError for BackupError {
    fn error_code(&self) -> &'static str {
        match self {
            BackupError::ConfigNotFound { .. } => "BACKUP_CONFIG_NOT_FOUND",
            BackupError::NotFound { .. } => "BACKUP_NOT_FOUND",
            BackupError::SnapshotMissing { .. } => "BACKUP_SNAPSHOT_MISSING",
            BackupError::TargetBusy { .. } => "BACKUP_TARGET_BUSY",
            BackupError::IndexCorrupt { .. } => "BACKUP_INDEX_CORRUPT",
            BackupError::IoError { .. } => "BACKUP_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            BackupError::NotFound { .. } | BackupError::TargetBusy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_error_codes() {
        let error = BackupError::NotFound {
            id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "Backup 'abc' not found");
        assert_eq!(error.error_code(), "BACKUP_NOT_FOUND");
        assert!(error.is_user_error());

        let error = BackupError::ConfigNotFound {
            path: PathBuf::from("/x.json"),
        };
        assert!(!error.is_user_error());
    }
}
