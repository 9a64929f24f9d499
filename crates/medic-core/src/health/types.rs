use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::clients::{ClientKind, TargetKey};
use crate::diagnostics::ClassifiedError;

/// Severity, totally ordered from `Healthy` to `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    #[default]
    Healthy,
    Minor,
    Major,
    Critical,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Minor => "minor",
            HealthLevel::Major => "major",
            HealthLevel::Critical => "critical",
        }
    }

    pub fn is_healthy(&self) -> bool {
        *self == HealthLevel::Healthy
    }
}

impl std::fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperHealth {
    pub health: HealthLevel,
    pub errors: Vec<ClassifiedError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatus {
    pub kind: ClientKind,
    pub display_name: String,
    pub config_path: PathBuf,
    pub running: bool,
    pub health: HealthLevel,
    pub helpers: BTreeMap<String, HelperHealth>,
    /// Records not attributed to any helper, evaluated with the helper rule.
    pub unattributed: HelperHealth,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ClientStatus {
    pub fn key(&self) -> TargetKey {
        TargetKey {
            kind: self.kind,
            config_path: self.config_path.clone(),
        }
    }

    /// Every record of this client, helper-attributed first.
    pub fn all_errors(&self) -> impl Iterator<Item = &ClassifiedError> {
        self.helpers
            .values()
            .flat_map(|h| h.errors.iter())
            .chain(self.unattributed.errors.iter())
    }
}

/// Health of the whole system, rebuilt from scratch every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub overall: HealthLevel,
    pub clients: Vec<ClientStatus>,
    pub checked_at: DateTime<Utc>,
}

impl SystemStatus {
    pub fn client(&self, key: &TargetKey) -> Option<&ClientStatus> {
        self.clients.iter().find(|c| &c.key() == key)
    }
}
