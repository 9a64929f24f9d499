use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::clients::{ClientKind, TargetKey};
use crate::diagnostics::{ClassifiedError, ErrorKind};
use crate::health::HealthLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Path,
    Command,
    Argument,
    Environment,
    Permission,
    Config,
    Package,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Path => "path",
            ChangeKind::Command => "command",
            ChangeKind::Argument => "argument",
            ChangeKind::Environment => "environment",
            ChangeKind::Permission => "permission",
            ChangeKind::Config => "config",
            ChangeKind::Package => "package",
        }
    }
}

/// What the executor does to carry out a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeAction {
    SetCommand {
        command: String,
    },
    SetArgs {
        args: Vec<String>,
    },
    SetEnv {
        key: String,
        /// Never written to history.
        #[serde(skip_serializing, default)]
        value: String,
    },
    SetMode {
        path: PathBuf,
        mode: u32,
    },
    /// A step the operator has to perform; never applied automatically.
    Manual {
        instructions: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairChange {
    pub kind: ChangeKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_helper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_value: Option<String>,
    pub action: ChangeAction,
}

impl RepairChange {
    pub fn is_manual(&self) -> bool {
        self.kind == ChangeKind::Package || matches!(self.action, ChangeAction::Manual { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairFix {
    pub for_error: ClassifiedError,
    pub description: String,
    pub changes: Vec<RepairChange>,
    pub automatic: bool,
    /// Advisor confidence, when an advisor ranked this fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Operator instructions for fixes that cannot be applied automatically.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
}

impl RepairFix {
    /// Whether the executor can carry this fix out.
    pub fn is_applicable(&self) -> bool {
        !self.changes.is_empty() && self.changes.iter().all(|c| !c.is_manual())
    }
}

/// Fixes for one client, pending execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    pub target: TargetKey,
    pub errors: Vec<ClassifiedError>,
    pub fixes: Vec<RepairFix>,
    pub requires_confirmation: bool,
}

impl RepairPlan {
    pub fn new(target: TargetKey, errors: Vec<ClassifiedError>, fixes: Vec<RepairFix>) -> Self {
        let requires_confirmation = fixes.iter().any(|f| !f.automatic);
        Self {
            target,
            errors,
            fixes,
            requires_confirmation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Planned,
    BackedUp,
    Applying,
    Verifying,
    Succeeded,
    RolledBack,
    Failed,
}

/// How a repair request for one client ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    Succeeded,
    RolledBack {
        reason: String,
    },
    /// `manual_intervention` is set when the configuration file may be left
    /// in an indeterminate state.
    Failed {
        reason: String,
        manual_intervention: bool,
        config_restored: bool,
    },
    /// Nothing could be applied without operator action.
    NothingToApply,
    /// Rejected before any work, e.g. another repair holds the target.
    Rejected {
        reason: String,
    },
    /// Cancelled before any change was applied.
    Cancelled,
}

impl RepairOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RepairOutcome::Succeeded | RepairOutcome::NothingToApply)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RepairOutcome::Succeeded => "succeeded",
            RepairOutcome::RolledBack { .. } => "rolled_back",
            RepairOutcome::Failed { .. } => "failed",
            RepairOutcome::NothingToApply => "nothing_to_apply",
            RepairOutcome::Rejected { .. } => "rejected",
            RepairOutcome::Cancelled => "cancelled",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RepairOutcome::RolledBack { reason }
            | RepairOutcome::Failed { reason, .. }
            | RepairOutcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Result of the verification pass after changes were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub health: HealthLevel,
    pub remaining: Vec<ClassifiedError>,
}

impl Verification {
    /// Targeted `(helper, kind)` pairs that are still present.
    pub fn still_present<'a>(&'a self, targeted: &'a [ClassifiedError]) -> Vec<&'a ClassifiedError> {
        self.remaining
            .iter()
            .filter(|r| {
                targeted
                    .iter()
                    .any(|t| t.kind == r.kind && t.helper == r.helper)
            })
            .collect()
    }
}

/// Everything that happened to one client during a repair request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub target: TargetKey,
    pub outcome: RepairOutcome,
    pub states: Vec<RepairState>,
    pub applied: Vec<RepairFix>,
    /// Fixes left for the operator: manual steps and unconfirmed fixes.
    pub pending: Vec<RepairFix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
}

/// History outcome; only terminal states of executed repairs are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Succeeded,
    RolledBack,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFix {
    pub error_kind: ErrorKind,
    pub message: String,
    pub description: String,
    pub changes: Vec<RepairChange>,
}

impl From<&RepairFix> for HistoryFix {
    fn from(fix: &RepairFix) -> Self {
        Self {
            error_kind: fix.for_error.kind,
            message: fix.for_error.message.clone(),
            description: fix.description.clone(),
            changes: fix.changes.clone(),
        }
    }
}

/// One line of the repair audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub client_kind: ClientKind,
    pub config_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    pub fixes: Vec<HistoryFix>,
    pub outcome: HistoryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub manual_intervention: bool,
}

impl HistoryEntry {
    pub fn target(&self) -> TargetKey {
        TargetKey {
            kind: self.client_kind,
            config_path: self.config_path.clone(),
        }
    }
}

/// Cooperative cancellation flag shared between a repair and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
