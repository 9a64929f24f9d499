//! Client inventory data types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::platform::Platform;

/// Supported client kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    ClaudeDesktop,
    Cursor,
    Windsurf,
    /// A client configured by path in `[[clients.custom]]`.
    Custom,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::ClaudeDesktop => "claude_desktop",
            ClientKind::Cursor => "cursor",
            ClientKind::Windsurf => "windsurf",
            ClientKind::Custom => "custom",
        }
    }

    /// Parse a client kind from a string (case-insensitive, `-` and `_` interchangeable).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "claude_desktop" | "claude" => Some(ClientKind::ClaudeDesktop),
            "cursor" => Some(ClientKind::Cursor),
            "windsurf" => Some(ClientKind::Windsurf),
            "custom" => Some(ClientKind::Custom),
            _ => None,
        }
    }

    /// Client kinds with a built-in backend.
    pub fn builtin() -> &'static [ClientKind] {
        &[
            ClientKind::ClaudeDesktop,
            ClientKind::Cursor,
            ClientKind::Windsurf,
        ]
    }
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ClientKind {
    type Err = crate::errors::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::errors::ConfigError::InvalidClient {
            kind: s.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperStatus {
    #[default]
    Unknown,
    Running,
    Stopped,
    Error,
}

/// A helper process configured inside a client's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperProcess {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory the client launches the helper in, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub last_known_status: HelperStatus,
}

impl HelperProcess {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            last_known_status: HelperStatus::Unknown,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// `command args...` as one line, for process-table matching and display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Serialization key for repairs and backups: one per configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    pub kind: ClientKind,
    pub config_path: PathBuf,
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.config_path.display())
    }
}

/// A detected client application and the helpers it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetClient {
    pub kind: ClientKind,
    pub display_name: String,
    pub config_path: PathBuf,
    /// Log directories to scan, most preferred first.
    #[serde(default)]
    pub log_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub process_patterns: Vec<String>,
    pub helper_processes: Vec<HelperProcess>,
}

impl TargetClient {
    pub fn key(&self) -> TargetKey {
        TargetKey {
            kind: self.kind,
            config_path: self.config_path.clone(),
        }
    }

    pub fn helper(&self, name: &str) -> Option<&HelperProcess> {
        self.helper_processes.iter().find(|h| h.name == name)
    }
}

/// A problem found while reading a client's helper-server map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub client: ClientKind,
    pub config_path: PathBuf,
    pub helper: Option<String>,
    pub message: String,
}

/// Result of scanning the host for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub platform: Platform,
    pub is_compat_layer: bool,
    pub helper_runtime_version: Option<String>,
    pub clients: Vec<TargetClient>,
    #[serde(default)]
    pub issues: Vec<ConfigIssue>,
}
