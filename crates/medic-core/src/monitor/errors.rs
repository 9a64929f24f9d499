use crate::errors::MedicError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Status check task failed: {message}")]
    CheckFailed { message: String },
}

impl MedicError for MonitorError {
    fn error_code(&self) -> &'static str {
        match self {
            MonitorError::AlreadyRunning => "MONITOR_ALREADY_RUNNING",
            MonitorError::CheckFailed { .. } => "MONITOR_CHECK_FAILED",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, MonitorError::AlreadyRunning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_error_codes() {
        assert_eq!(MonitorError::AlreadyRunning.error_code(), "MONITOR_ALREADY_RUNNING");
        let err = MonitorError::CheckFailed {
            message: "panicked".to_string(),
        };
        assert_eq!(err.error_code(), "MONITOR_CHECK_FAILED");
        assert!(!err.is_user_error());
    }
}
