use crate::backup::BackupError;
use crate::clients::ClientError;
use crate::errors::MedicError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Another repair is in progress for {target}")]
    TargetBusy { target: String },

    #[error("Helper '{name}' is no longer in the configuration")]
    HelperMissing { name: String },

    #[error("Failed to change permissions of '{}': {message}", path.display())]
    PermissionChange { path: PathBuf, message: String },

    #[error("Backup failed: {source}")]
    Backup {
        #[from]
        source: BackupError,
    },

    #[error("Client configuration error: {source}")]
    Client {
        #[from]
        source: ClientError,
    },

    #[error("Repair history error: {message}")]
    History { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl MedicError for RepairError {
    fn error_code(&self) -> &'static str {
        match self {
            RepairError::TargetBusy { .. } => "REPAIR_TARGET_BUSY",
            RepairError::HelperMissing { .. } => "REPAIR_HELPER_MISSING",
            RepairError::PermissionChange { .. } => "REPAIR_PERMISSION_CHANGE_FAILED",
            RepairError::Backup { .. } => "REPAIR_BACKUP_FAILED",
            RepairError::Client { .. } => "REPAIR_CLIENT_CONFIG_ERROR",
            RepairError::History { .. } => "REPAIR_HISTORY_ERROR",
            RepairError::IoError { .. } => "REPAIR_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, RepairError::TargetBusy { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("Repair advisor unavailable: {message}")]
    Unavailable { message: String },

    #[error("Repair advisor returned a malformed response: {message}")]
    Malformed { message: String },
}

impl MedicError for AdvisorError {
    fn error_code(&self) -> &'static str {
        match self {
            AdvisorError::Unavailable { .. } => "ADVISOR_UNAVAILABLE",
            AdvisorError::Malformed { .. } => "ADVISOR_MALFORMED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_error_wraps_backup_error() {
        let error: RepairError = BackupError::NotFound {
            id: "x".to_string(),
        }
        .into();
        assert_eq!(error.error_code(), "REPAIR_BACKUP_FAILED");
        assert!(error.to_string().contains("Backup 'x' not found"));
    }

    #[test]
    fn test_advisor_error_codes() {
        let error = AdvisorError::Malformed {
            message: "bad".to_string(),
        };
        assert_eq!(error.error_code(), "ADVISOR_MALFORMED");
        assert!(!error.is_user_error());
    }
}
