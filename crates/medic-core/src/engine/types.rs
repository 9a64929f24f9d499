use serde::{Deserialize, Serialize};

use crate::clients::ClientKind;
use crate::health::{HealthLevel, SystemStatus};
use crate::isolation::IsolationResult;
use crate::platform::Platform;
use crate::repair::{CancellationToken, RepairPlan, RepairReport};

/// Result of probing one helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperIsolation {
    pub client: ClientKind,
    pub helper: String,
    pub result: IsolationResult,
    pub probes_run: usize,
}

/// Output of `diagnose`: status including probe findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnoseReport {
    pub platform: Platform,
    pub is_compat_layer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_runtime_version: Option<String>,
    pub status: SystemStatus,
    pub isolation: Vec<HelperIsolation>,
    pub warnings: Vec<String>,
}

impl DiagnoseReport {
    /// Whether any error was classified or any probe found a fault.
    pub fn has_faults(&self) -> bool {
        self.isolation.iter().any(|i| i.result.fault)
            || self
                .status
                .clients
                .iter()
                .any(|c| c.all_errors().next().is_some())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepairRequest {
    /// Restrict to one client kind.
    pub client: Option<ClientKind>,
    /// Plan only.
    pub dry_run: bool,
    /// Apply fixes that are not automatic without asking.
    pub auto_confirm: bool,
    pub cancel: CancellationToken,
}

/// Plan for one client with the health it had when planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPlan {
    pub client: ClientKind,
    pub display_name: String,
    pub baseline: HealthLevel,
    pub plan: RepairPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub dry_run: bool,
    pub plans: Vec<ClientPlan>,
    pub reports: Vec<RepairReport>,
}

impl RepairSummary {
    /// Every executed repair succeeded or had nothing to do.
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_success())
    }
}
