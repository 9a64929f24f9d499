//! Repair execution under the backup / apply / verify / rollback protocol.
//!
//! Per client the request moves through
//! `Planned -> BackedUp -> Applying -> Verifying -> {Succeeded | RolledBack | Failed}`.
//! The target key is held from the backup until the terminal state, so no
//! other repair, backup or restore can touch the same configuration file.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::backup::{BackupRecord, BackupStore};
use crate::clients::config_file::{helper_entry_mut, load_document, read_helpers, save_document};
use crate::clients::{ConfigIssue, TargetClient, is_client_running};
use crate::diagnostics::{ClassifiedError, LogClassifier, LogScanOptions, analyze_client};
use crate::health::{HealthLevel, evaluate};
use crate::isolation::{ProbeContext, standard_tree};
use crate::repair::errors::RepairError;
use crate::repair::history::RepairHistory;
use crate::repair::locks::TargetGuard;
use crate::repair::types::{
    CancellationToken, ChangeAction, HistoryEntry, HistoryOutcome, RepairChange, RepairFix,
    RepairOutcome, RepairPlan, RepairReport, RepairState, Verification,
};

/// Re-evaluates a client after its configuration was changed.
pub trait Verifier: Send + Sync {
    /// Health of `client` and the records still present, considering only
    /// evidence newer than `since`.
    fn verify(
        &self,
        client: &TargetClient,
        since: DateTime<Utc>,
        targeted: &[ClassifiedError],
    ) -> Verification;
}

/// Verification against the live system: re-read the configuration from
/// disk, classify fresh log lines, probe each targeted helper and evaluate.
pub struct SystemVerifier {
    classifier: Arc<LogClassifier>,
    max_log_lines: usize,
    probe_timeout: Duration,
}

impl SystemVerifier {
    pub fn new(classifier: Arc<LogClassifier>, max_log_lines: usize, probe_timeout: Duration) -> Self {
        Self {
            classifier,
            max_log_lines,
            probe_timeout,
        }
    }
}

impl Verifier for SystemVerifier {
    fn verify(
        &self,
        client: &TargetClient,
        since: DateTime<Utc>,
        targeted: &[ClassifiedError],
    ) -> Verification {
        let parsed = match read_helpers(&client.config_path) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    event = "core.repair.verify_failed",
                    client = %client.kind,
                    error = %e
                );
                return Verification {
                    health: HealthLevel::Critical,
                    remaining: targeted.to_vec(),
                };
            }
        };

        let refreshed = TargetClient {
            helper_processes: parsed.helpers,
            ..client.clone()
        };
        let issues: Vec<ConfigIssue> = parsed
            .issues
            .into_iter()
            .map(|(helper, message)| ConfigIssue {
                client: client.kind,
                config_path: client.config_path.clone(),
                helper,
                message,
            })
            .collect();

        let analysis = analyze_client(
            &self.classifier,
            &refreshed,
            &issues,
            LogScanOptions {
                max_lines: self.max_log_lines,
                since: Some(since),
            },
        );

        let mut remaining = analysis.errors;
        let tree = standard_tree();
        for helper in &refreshed.helper_processes {
            if !targeted.iter().any(|t| t.helper.as_deref() == Some(&helper.name)) {
                continue;
            }
            let ctx = ProbeContext::new(helper, self.probe_timeout);
            if let Some(found) = tree.traverse(&ctx).result.to_error(Some(client.kind))
                && !remaining.iter().any(|r| r.dedup_key() == found.dedup_key())
            {
                remaining.push(found);
            }
        }

        let status = evaluate(
            &refreshed,
            is_client_running(&refreshed),
            &remaining,
            analysis.warnings,
        );
        Verification {
            health: status.health,
            remaining,
        }
    }
}

/// Per-request execution switches.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Operator accepted the fixes that are not automatic.
    pub confirmed: bool,
    /// Client health before the repair; verification must not end above it.
    pub baseline: HealthLevel,
    pub cancel: CancellationToken,
}

impl ExecuteOptions {
    pub fn new(baseline: HealthLevel) -> Self {
        Self {
            confirmed: false,
            baseline,
            cancel: CancellationToken::new(),
        }
    }
}

pub struct RepairExecutor {
    store: Arc<BackupStore>,
    history: Arc<RepairHistory>,
    verifier: Arc<dyn Verifier>,
}

/// Why applying stopped early.
enum ApplyStop {
    Cancelled,
    Failed(RepairError),
}

impl RepairExecutor {
    pub fn new(
        store: Arc<BackupStore>,
        history: Arc<RepairHistory>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            store,
            history,
            verifier,
        }
    }

    /// Run a plan against one client.
    pub fn execute(
        &self,
        client: &TargetClient,
        plan: &RepairPlan,
        options: &ExecuteOptions,
    ) -> RepairReport {
        let (applicable, pending): (Vec<RepairFix>, Vec<RepairFix>) = plan
            .fixes
            .iter()
            .cloned()
            .partition(|f| f.is_applicable() && (f.automatic || options.confirmed));

        let mut report = RepairReport {
            target: client.key(),
            outcome: RepairOutcome::NothingToApply,
            states: vec![RepairState::Planned],
            applied: Vec::new(),
            pending,
            backup_id: None,
            verification: None,
            history_id: None,
        };

        if applicable.is_empty() {
            info!(
                event = "core.repair.execute_skipped",
                client = %client.kind,
                pending = report.pending.len()
            );
            return report;
        }

        let Some(guard) = self.store.locks().try_acquire(&client.key()) else {
            warn!(event = "core.repair.execute_rejected", client = %client.kind);
            report.outcome = RepairOutcome::Rejected {
                reason: RepairError::TargetBusy {
                    target: client.key().to_string(),
                }
                .to_string(),
            };
            return report;
        };

        if options.cancel.is_cancelled() {
            report.outcome = RepairOutcome::Cancelled;
            return report;
        }

        info!(
            event = "core.repair.execute_started",
            client = %client.kind,
            fix_count = applicable.len()
        );
        let started_at = Utc::now();

        let backup = match self.pre_repair_backup(&guard, client, started_at) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    event = "core.repair.backup_failed",
                    client = %client.kind,
                    error = %e
                );
                report.outcome = RepairOutcome::Failed {
                    reason: format!("No backup could be taken: {}", e),
                    manual_intervention: false,
                    config_restored: false,
                };
                report.states.push(RepairState::Failed);
                report.history_id = self.record(client, &applicable, None, &report.outcome);
                return report;
            }
        };
        report.backup_id = Some(backup.id.clone());
        report.states.push(RepairState::BackedUp);

        if options.cancel.is_cancelled() {
            info!(event = "core.repair.execute_cancelled", client = %client.kind);
            report.outcome = RepairOutcome::Cancelled;
            return report;
        }

        report.states.push(RepairState::Applying);
        let mut prior_modes: Vec<(PathBuf, u32)> = Vec::new();
        let applied = apply_fixes(client, &applicable, &options.cancel, &mut prior_modes);

        if let Err(stop) = applied {
            let reason = match &stop {
                ApplyStop::Cancelled => "Cancelled while applying changes".to_string(),
                ApplyStop::Failed(e) => format!("Applying changes failed: {}", e),
            };
            warn!(
                event = "core.repair.apply_failed",
                client = %client.kind,
                reason = %reason
            );
            let restored = self.roll_back(&guard, &backup, &prior_modes);
            report.outcome = match (stop, restored) {
                (ApplyStop::Cancelled, true) => {
                    report.verification =
                        Some(self.verifier.verify(client, started_at, &plan.errors));
                    report.states.push(RepairState::RolledBack);
                    RepairOutcome::RolledBack { reason }
                }
                (_, restored) => {
                    report.states.push(RepairState::Failed);
                    RepairOutcome::Failed {
                        reason,
                        manual_intervention: !restored,
                        config_restored: restored,
                    }
                }
            };
            report.history_id =
                self.record(client, &applicable, Some(&backup.id), &report.outcome);
            return report;
        }
        report.applied = applicable;

        report.states.push(RepairState::Verifying);
        let targeted: Vec<ClassifiedError> =
            report.applied.iter().map(|f| f.for_error.clone()).collect();
        let verification = self.verifier.verify(client, started_at, &targeted);
        let still_present = verification.still_present(&targeted).len();
        let regressed = verification.health > options.baseline;

        if !regressed && still_present == 0 {
            info!(
                event = "core.repair.execute_completed",
                client = %client.kind,
                health = %verification.health
            );
            report.verification = Some(verification);
            report.outcome = RepairOutcome::Succeeded;
            report.states.push(RepairState::Succeeded);
        } else {
            let reason = if regressed {
                format!(
                    "Health regressed from {} to {}",
                    options.baseline, verification.health
                )
            } else {
                format!("{} targeted error(s) still present", still_present)
            };
            warn!(
                event = "core.repair.verify_failed",
                client = %client.kind,
                reason = %reason
            );

            if self.roll_back(&guard, &backup, &prior_modes) {
                report.verification =
                    Some(self.verifier.verify(client, started_at, &targeted));
                report.outcome = RepairOutcome::RolledBack { reason };
                report.states.push(RepairState::RolledBack);
            } else {
                report.verification = Some(verification);
                report.outcome = RepairOutcome::Failed {
                    reason: format!("{}; restoring the backup failed", reason),
                    manual_intervention: true,
                    config_restored: false,
                };
                report.states.push(RepairState::Failed);
            }
        }

        report.history_id =
            self.record(client, &report.applied, Some(&backup.id), &report.outcome);
        report
    }

    /// A backup holding exactly the current bytes of the configuration file.
    fn pre_repair_backup(
        &self,
        guard: &TargetGuard,
        client: &TargetClient,
        now: DateTime<Utc>,
    ) -> Result<BackupRecord, RepairError> {
        let ensured = self.store.ensure_fresh_backup_held(guard, client, now)?;
        if ensured.created || self.store.snapshot_matches(&ensured.record, &client.config_path) {
            return Ok(ensured.record);
        }
        Ok(self.store.create_backup_held(guard, client, now)?)
    }

    /// Restore the backup and revert permission changes. False when the
    /// configuration file could not be restored.
    fn roll_back(&self, guard: &TargetGuard, backup: &BackupRecord, prior_modes: &[(PathBuf, u32)]) -> bool {
        for (path, mode) in prior_modes.iter().rev() {
            if let Err(e) = set_mode(path, *mode) {
                warn!(
                    event = "core.repair.mode_revert_failed",
                    path = %path.display(),
                    error = %e
                );
            }
        }
        match self.store.restore_held(guard, &backup.id) {
            Ok(_) => {
                info!(event = "core.repair.rollback_completed", backup_id = %backup.id);
                true
            }
            Err(e) => {
                error!(
                    event = "core.repair.rollback_failed",
                    backup_id = %backup.id,
                    error = %e
                );
                false
            }
        }
    }

    fn record(
        &self,
        client: &TargetClient,
        fixes: &[RepairFix],
        backup_id: Option<&str>,
        outcome: &RepairOutcome,
    ) -> Option<String> {
        let (outcome_kind, manual_intervention) = match outcome {
            RepairOutcome::Succeeded => (HistoryOutcome::Succeeded, false),
            RepairOutcome::RolledBack { .. } => (HistoryOutcome::RolledBack, false),
            RepairOutcome::Failed {
                manual_intervention,
                ..
            } => (HistoryOutcome::Failed, *manual_intervention),
            _ => return None,
        };
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            client_kind: client.kind,
            config_path: client.config_path.clone(),
            backup_id: backup_id.map(str::to_string),
            fixes: fixes.iter().map(Into::into).collect(),
            outcome: outcome_kind,
            reason: outcome.reason().map(str::to_string),
            manual_intervention,
        };
        match self.history.append(&entry) {
            Ok(()) => Some(entry.id),
            Err(e) => {
                error!(event = "core.history.append_failed", error = %e);
                None
            }
        }
    }
}

/// Apply every change in order. Document edits are written in one atomic
/// save at the end; permission changes take effect immediately and their
/// prior modes are pushed onto `prior_modes`.
fn apply_fixes(
    client: &TargetClient,
    fixes: &[RepairFix],
    cancel: &CancellationToken,
    prior_modes: &mut Vec<(PathBuf, u32)>,
) -> Result<(), ApplyStop> {
    let mut document =
        load_document(&client.config_path).map_err(|e| ApplyStop::Failed(e.into()))?;
    let mut document_changed = false;

    for fix in fixes {
        for change in &fix.changes {
            if cancel.is_cancelled() {
                return Err(ApplyStop::Cancelled);
            }
            match &change.action {
                ChangeAction::SetMode { path, mode } => {
                    let prior = current_mode(path).map_err(ApplyStop::Failed)?;
                    set_mode(path, *mode).map_err(ApplyStop::Failed)?;
                    prior_modes.push((path.clone(), prior));
                }
                ChangeAction::Manual { .. } => {}
                _ => {
                    apply_document_change(&mut document, change).map_err(ApplyStop::Failed)?;
                    document_changed = true;
                }
            }
            info!(
                event = "core.repair.change_applied",
                client = %client.kind,
                kind = change.kind.as_str(),
                helper = change.target_helper.as_deref().unwrap_or("-"),
                description = %change.description
            );
        }
    }

    if cancel.is_cancelled() {
        return Err(ApplyStop::Cancelled);
    }
    if document_changed {
        save_document(&client.config_path, &document).map_err(|e| ApplyStop::Failed(e.into()))?;
    }
    Ok(())
}

fn apply_document_change(document: &mut Value, change: &RepairChange) -> Result<(), RepairError> {
    let name = change.target_helper.as_deref().unwrap_or_default();
    let entry = helper_entry_mut(document, name).ok_or_else(|| RepairError::HelperMissing {
        name: name.to_string(),
    })?;

    match &change.action {
        ChangeAction::SetCommand { command } => {
            entry.insert("command".to_string(), Value::String(command.clone()));
        }
        ChangeAction::SetArgs { args } => {
            let args = args.iter().cloned().map(Value::String).collect();
            entry.insert("args".to_string(), Value::Array(args));
        }
        ChangeAction::SetEnv { key, value } => {
            let env = entry
                .entry("env".to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if !env.is_object() {
                *env = Value::Object(Default::default());
            }
            if let Some(env) = env.as_object_mut() {
                env.insert(key.clone(), Value::String(value.clone()));
            }
        }
        ChangeAction::SetMode { .. } | ChangeAction::Manual { .. } => {}
    }
    Ok(())
}

#[cfg(unix)]
fn current_mode(path: &std::path::Path) -> Result<u32, RepairError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .map_err(|e| RepairError::PermissionChange {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(unix)]
fn set_mode(path: &std::path::Path, mode: u32) -> Result<(), RepairError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        RepairError::PermissionChange {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

#[cfg(not(unix))]
fn current_mode(path: &std::path::Path) -> Result<u32, RepairError> {
    Err(RepairError::PermissionChange {
        path: path.to_path_buf(),
        message: "file modes are not supported on this platform".to_string(),
    })
}

#[cfg(not(unix))]
fn set_mode(path: &std::path::Path, _mode: u32) -> Result<(), RepairError> {
    Err(RepairError::PermissionChange {
        path: path.to_path_buf(),
        message: "file modes are not supported on this platform".to_string(),
    })
}
