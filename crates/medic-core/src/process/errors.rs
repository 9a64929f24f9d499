use crate::errors::MedicError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process '{pid}' not found")]
    NotFound { pid: u32 },

    #[error("Process table unavailable: {message}")]
    TableUnavailable { message: String },

    #[error("Invalid PID: {pid}")]
    InvalidPid { pid: u32 },
}

impl MedicError for ProcessError {
    fn error_code(&self) -> &'static str {
        match self {
            ProcessError::NotFound { .. } => "PROCESS_NOT_FOUND",
            ProcessError::TableUnavailable { .. } => "PROCESS_TABLE_UNAVAILABLE",
            ProcessError::InvalidPid { .. } => "PROCESS_INVALID_PID",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, ProcessError::InvalidPid { .. })
    }
}
