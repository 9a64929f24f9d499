use serde::{Deserialize, Serialize};

use crate::clients::ClientKind;

/// Taxonomy of diagnosed failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing executable, module or file.
    PathError,
    /// Missing or incorrect environment variable.
    EnvironmentError,
    /// Filesystem access denied.
    PermissionError,
    /// Malformed configuration.
    ConfigError,
    /// Connectivity problem or timeout.
    NetworkError,
    /// Helper failed to start or crashed.
    ProcessError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PathError => "PathError",
            ErrorKind::EnvironmentError => "EnvironmentError",
            ErrorKind::PermissionError => "PermissionError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::ProcessError => "ProcessError",
            ErrorKind::UnknownError => "UnknownError",
        }
    }

    /// Kinds after which the helper cannot be considered working.
    pub fn is_structurally_fatal(&self) -> bool {
        matches!(self, ErrorKind::PathError | ErrorKind::ProcessError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed diagnosis extracted from log evidence or active probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// The log line (or probe description) that produced this record.
    pub raw_evidence: String,
    /// Stable id of the rule that matched, e.g. `command_not_found`.
    pub shape: String,
    /// Token captured by the rule: command, module, path or variable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientKind>,
    pub fixable: bool,
}

impl ClassifiedError {
    pub fn for_helper(mut self, helper: Option<&str>) -> Self {
        self.helper = helper.map(str::to_string);
        self
    }

    pub fn for_client(mut self, client: ClientKind) -> Self {
        self.client = Some(client);
        self
    }

    /// Identity used for de-duplication within one analysis pass.
    pub fn dedup_key(&self) -> (Option<&str>, ErrorKind, &str) {
        (self.helper.as_deref(), self.kind, self.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_as_taxonomy_name() {
        let json = serde_json::to_string(&ErrorKind::PermissionError).unwrap();
        assert_eq!(json, "\"PermissionError\"");
        assert_eq!(ErrorKind::PermissionError.to_string(), "PermissionError");
    }

    #[test]
    fn test_structurally_fatal_kinds() {
        assert!(ErrorKind::PathError.is_structurally_fatal());
        assert!(ErrorKind::ProcessError.is_structurally_fatal());
        assert!(!ErrorKind::NetworkError.is_structurally_fatal());
        assert!(!ErrorKind::PermissionError.is_structurally_fatal());
    }
}
