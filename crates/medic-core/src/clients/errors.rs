use crate::errors::MedicError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Client configuration not found at '{}'", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse client configuration '{}': {message}", path.display())]
    ConfigParseFailed { path: PathBuf, message: String },

    #[error("Helper process '{name}' not found in '{}'", path.display())]
    HelperNotFound { name: String, path: PathBuf },

    #[error("Client configuration has an unexpected shape: {message}")]
    InvalidDocument { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl MedicError for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            ClientError::ConfigNotFound { .. } => "CLIENT_CONFIG_NOT_FOUND",
            ClientError::ConfigParseFailed { .. } => "CLIENT_CONFIG_PARSE_FAILED",
            ClientError::HelperNotFound { .. } => "CLIENT_HELPER_NOT_FOUND",
            ClientError::InvalidDocument { .. } => "CLIENT_INVALID_DOCUMENT",
            ClientError::IoError { .. } => "CLIENT_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            ClientError::ConfigParseFailed { .. } | ClientError::InvalidDocument { .. }
        )
    }
}
