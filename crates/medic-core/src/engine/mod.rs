//! Programmatic equivalents of the CLI verbs.
//!
//! [`Engine`] owns every long-lived collaborator (backup store, history,
//! target locks, classifier, optional advisor and verifier) and a cached
//! client inventory. `status`, `diagnose` and `repair` all evaluate clients
//! through the same path, which is also what the monitor loop runs.

pub mod types;

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::backup::{BackupError, BackupRecord, BackupStore};
use crate::clients::{
    ClientKind, ConfigIssue, DetectionReport, TargetClient, annotate_helper_status, detect,
    reload_clients,
};
use crate::config::{Config, MedicConfig};
use crate::diagnostics::{ClassifiedError, LogClassifier, LogScanOptions, analyze_client};
use crate::health::{ClientStatus, SystemStatus, evaluate, system_status};
use crate::isolation::{ProbeContext, standard_tree};
use crate::monitor::StatusSource;
use crate::platform::HostContext;
use crate::process::{ProcessInfo, find_process, snapshot_processes};
use crate::repair::{
    ExecuteOptions, HistoryEntry, RepairAdvisor, RepairError, RepairExecutor, RepairHistory,
    RepairPlanner, SystemVerifier, TargetLocks, TemplateContext, Verifier,
};

pub use types::{ClientPlan, DiagnoseReport, HelperIsolation, RepairRequest, RepairSummary};

/// One client run through liveness, classification and, optionally, probing.
struct Evaluation {
    client: TargetClient,
    status: ClientStatus,
    errors: Vec<ClassifiedError>,
    isolation: Vec<HelperIsolation>,
}

pub struct Engine {
    host: HostContext,
    config: Config,
    settings: MedicConfig,
    classifier: Arc<LogClassifier>,
    store: Arc<BackupStore>,
    history: Arc<RepairHistory>,
    planner: RepairPlanner,
    verifier: Arc<dyn Verifier>,
    inventory: Mutex<Option<DetectionReport>>,
}

impl Engine {
    pub fn new(host: HostContext, config: Config, settings: MedicConfig) -> Self {
        let classifier = Arc::new(LogClassifier::from_config(&settings.diagnostics));
        let locks = TargetLocks::new();
        let store = Arc::new(BackupStore::from_config(&config, &settings.backup, locks));
        let history = Arc::new(RepairHistory::new(config.history_file()));
        let planner = RepairPlanner::new(TemplateContext::detect(&host));
        let verifier = Arc::new(SystemVerifier::new(
            Arc::clone(&classifier),
            settings.diagnostics.max_log_lines(),
            settings.diagnostics.probe_timeout(),
        ));

        Self {
            host,
            config,
            settings,
            classifier,
            store,
            history,
            planner,
            verifier,
            inventory: Mutex::new(None),
        }
    }

    pub fn with_advisor(self, advisor: Arc<dyn RepairAdvisor>) -> Self {
        Self {
            planner: self.planner.with_advisor(advisor),
            ..self
        }
    }

    pub fn with_verifier(self, verifier: Arc<dyn Verifier>) -> Self {
        Self { verifier, ..self }
    }

    pub fn with_templates(self, templates: TemplateContext) -> Self {
        Self {
            planner: RepairPlanner::new(templates),
            ..self
        }
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &MedicConfig {
        &self.settings
    }

    pub fn store(&self) -> &Arc<BackupStore> {
        &self.store
    }

    /// Scan the host from scratch and replace the cached inventory.
    pub fn detect(&self) -> DetectionReport {
        let report = detect(&self.host, &self.settings.clients);
        *self.inventory.lock().unwrap_or_else(|e| e.into_inner()) = Some(report.clone());
        report
    }

    /// The cached inventory with helper lists re-read from disk. A missing
    /// or empty inventory triggers a fresh scan.
    pub fn inventory(&self) -> DetectionReport {
        let mut cached = self.inventory.lock().unwrap_or_else(|e| e.into_inner());
        let report = match cached.take() {
            Some(report) if !report.clients.is_empty() => {
                let (clients, issues) = reload_clients(report.clients);
                DetectionReport {
                    clients,
                    issues,
                    ..report
                }
            }
            _ => detect(&self.host, &self.settings.clients),
        };
        *cached = Some(report.clone());
        report
    }

    /// Liveness, log classification and health of every client.
    pub fn status(&self) -> SystemStatus {
        let report = self.inventory();
        let processes = self.process_snapshot();
        let clients = report
            .clients
            .iter()
            .map(|c| {
                self.evaluate(c, &report.issues, processes.as_deref(), false)
                    .status
            })
            .collect();
        let status = system_status(clients, Utc::now());
        info!(
            event = "core.engine.status_completed",
            overall = %status.overall,
            client_count = status.clients.len()
        );
        status
    }

    /// Status plus active probing of helpers that left no log evidence.
    pub fn diagnose(&self, filter: Option<ClientKind>) -> DiagnoseReport {
        info!(event = "core.engine.diagnose_started", client = ?filter);
        let report = self.inventory();
        let processes = self.process_snapshot();

        let mut clients = Vec::new();
        let mut isolation = Vec::new();
        let mut warnings = Vec::new();
        for client in matching(&report.clients, filter) {
            let evaluation = self.evaluate(client, &report.issues, processes.as_deref(), true);
            warnings.extend(evaluation.status.warnings.iter().cloned());
            isolation.extend(evaluation.isolation);
            clients.push(evaluation.status);
        }

        let diagnosis = DiagnoseReport {
            platform: report.platform,
            is_compat_layer: report.is_compat_layer,
            helper_runtime_version: report.helper_runtime_version,
            status: system_status(clients, Utc::now()),
            isolation,
            warnings,
        };
        info!(
            event = "core.engine.diagnose_completed",
            overall = %diagnosis.status.overall,
            faults = diagnosis.has_faults()
        );
        diagnosis
    }

    /// Plan and, unless `dry_run`, execute repairs client by client.
    pub fn repair(&self, request: &RepairRequest) -> RepairSummary {
        info!(
            event = "core.engine.repair_started",
            client = ?request.client,
            dry_run = request.dry_run
        );
        let report = self.inventory();
        let processes = self.process_snapshot();
        let executor = RepairExecutor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.history),
            Arc::clone(&self.verifier),
        );

        let mut summary = RepairSummary {
            dry_run: request.dry_run,
            plans: Vec::new(),
            reports: Vec::new(),
        };

        for client in matching(&report.clients, request.client) {
            let evaluation = self.evaluate(client, &report.issues, processes.as_deref(), true);
            let log_text = evaluation
                .errors
                .iter()
                .map(|e| e.raw_evidence.as_str())
                .filter(|raw| !raw.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            let plan = self.planner.plan_with_advice(
                &evaluation.client,
                &evaluation.errors,
                &log_text,
            );
            let baseline = evaluation.status.health;

            if !request.dry_run && !plan.is_empty() {
                let options = ExecuteOptions {
                    confirmed: request.auto_confirm,
                    baseline,
                    cancel: request.cancel.clone(),
                };
                summary
                    .reports
                    .push(executor.execute(&evaluation.client, &plan, &options));
            }

            summary.plans.push(ClientPlan {
                client: client.kind,
                display_name: client.display_name.clone(),
                baseline,
                plan,
            });
        }

        info!(
            event = "core.engine.repair_completed",
            plan_count = summary.plans.len(),
            executed = summary.reports.len(),
            success = summary.is_success()
        );
        summary
    }

    /// Back up every matching client's configuration.
    pub fn create_backups(
        &self,
        filter: Option<ClientKind>,
    ) -> Result<Vec<BackupRecord>, BackupError> {
        let report = self.inventory();
        matching(&report.clients, filter)
            .map(|client| self.store.create_backup(client))
            .collect()
    }

    /// Backups, newest first.
    pub fn list_backups(
        &self,
        filter: Option<ClientKind>,
    ) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records: Vec<BackupRecord> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|r| filter.is_none_or(|kind| r.client_kind == kind))
            .collect();
        records.reverse();
        Ok(records)
    }

    pub fn restore_backup(&self, id: &str) -> Result<BackupRecord, BackupError> {
        self.store.restore(id)
    }

    pub fn delete_backup(&self, id: &str) -> Result<bool, BackupError> {
        self.store.delete(id)
    }

    /// Repair history, oldest first, limited to the newest `limit` entries.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, RepairError> {
        self.history.load(limit)
    }

    fn process_snapshot(&self) -> Option<Vec<ProcessInfo>> {
        match snapshot_processes() {
            Ok(processes) => Some(processes),
            Err(e) => {
                warn!(event = "core.engine.process_snapshot_failed", error = %e);
                None
            }
        }
    }

    /// Evidence older than the target's last successful repair is ignored.
    fn evidence_since(&self, client: &TargetClient) -> Option<DateTime<Utc>> {
        match self.history.last_success(&client.key()) {
            Ok(entry) => entry.map(|e| e.timestamp),
            Err(e) => {
                warn!(
                    event = "core.engine.history_read_failed",
                    client = %client.kind,
                    error = %e
                );
                None
            }
        }
    }

    fn evaluate(
        &self,
        client: &TargetClient,
        issues: &[ConfigIssue],
        processes: Option<&[ProcessInfo]>,
        isolate: bool,
    ) -> Evaluation {
        let running = match processes {
            Some(processes) if !client.process_patterns.is_empty() => {
                find_process(processes, &client.process_patterns, None).is_some()
            }
            _ => false,
        };
        let mut client = client.clone();
        annotate_helper_status(&mut client, processes, running);

        let analysis = analyze_client(
            &self.classifier,
            &client,
            issues,
            LogScanOptions {
                max_lines: self.settings.diagnostics.max_log_lines(),
                since: self.evidence_since(&client),
            },
        );

        let mut errors = analysis.errors;
        let mut isolation = Vec::new();
        if isolate {
            let tree = standard_tree();
            let timeout = self.settings.diagnostics.probe_timeout();
            for helper in &client.helper_processes {
                if errors.iter().any(|e| e.helper.as_deref() == Some(&helper.name)) {
                    continue;
                }
                let traversal = tree.traverse(&ProbeContext::new(helper, timeout));
                if let Some(error) = traversal.result.to_error(Some(client.kind)) {
                    errors.push(error);
                }
                isolation.push(HelperIsolation {
                    client: client.kind,
                    helper: helper.name.clone(),
                    result: traversal.result,
                    probes_run: traversal.probes_run,
                });
            }
        }

        let status = evaluate(&client, running, &errors, analysis.warnings);
        Evaluation {
            client,
            status,
            errors,
            isolation,
        }
    }
}

impl StatusSource for Engine {
    fn check(&self) -> SystemStatus {
        self.status()
    }
}

fn matching(
    clients: &[TargetClient],
    filter: Option<ClientKind>,
) -> impl Iterator<Item = &TargetClient> {
    clients
        .iter()
        .filter(move |c| filter.is_none_or(|kind| c.kind == kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;
    use crate::health::HealthLevel;
    use crate::platform::Platform;
    use crate::repair::{RepairOutcome, Verification};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct CleanVerifier;

    impl Verifier for CleanVerifier {
        fn verify(
            &self,
            _client: &TargetClient,
            _since: DateTime<Utc>,
            _targeted: &[ClassifiedError],
        ) -> Verification {
            Verification {
                health: HealthLevel::Healthy,
                remaining: vec![],
            }
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn engine(dir: &TempDir) -> Engine {
        let host = HostContext::with_home(Platform::Linux, dir.path());
        let templates = TemplateContext {
            platform: Platform::Linux,
            search_dirs: vec![],
            host_env: BTreeMap::new(),
            home: dir.path().to_path_buf(),
        };
        Engine::new(
            host,
            Config::with_dir(dir.path().join(".medic")),
            MedicConfig::default(),
        )
        .with_templates(templates)
        .with_verifier(Arc::new(CleanVerifier))
    }

    /// A cursor install whose `gh` helper runs an executable fake `npx`.
    #[cfg(unix)]
    fn install_cursor(dir: &TempDir) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let npx = dir.path().join("bin").join("npx");
        write(&npx, "#!/bin/sh\n");
        fs::set_permissions(&npx, fs::Permissions::from_mode(0o755)).unwrap();

        let config = dir.path().join(".cursor").join("mcp.json");
        write(
            &config,
            &format!(
                r#"{{"mcpServers": {{"gh": {{"command": "{}", "args": ["server-github"]}}}}}}"#,
                npx.display()
            ),
        );
        write(
            &dir.path().join(".config/Cursor/logs/mcp-server-gh.log"),
            "Error: Cannot find module 'server-github'\n",
        );
        config
    }

    #[test]
    fn test_status_with_no_clients_is_healthy() {
        let dir = TempDir::new().unwrap();
        let status = engine(&dir).status();
        assert!(status.clients.is_empty());
        assert_eq!(status.overall, HealthLevel::Healthy);
    }

    #[cfg(unix)]
    #[test]
    fn test_status_classifies_helper_logs() {
        let dir = TempDir::new().unwrap();
        install_cursor(&dir);
        let status = engine(&dir).status();

        assert_eq!(status.clients.len(), 1);
        let cursor = &status.clients[0];
        let gh = &cursor.helpers["gh"];
        assert_eq!(gh.health, HealthLevel::Major);
        assert_eq!(gh.errors[0].kind, ErrorKind::PathError);
        assert!(status.overall >= HealthLevel::Minor);
    }

    #[test]
    fn test_diagnose_probes_helpers_without_log_evidence() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join(".cursor/mcp.json"),
            r#"{"mcpServers": {"ghost": {"command": "medic-test-no-such-command"}}}"#,
        );

        let report = engine(&dir).diagnose(Some(ClientKind::Cursor));
        assert_eq!(report.isolation.len(), 1);
        let finding = &report.isolation[0];
        assert_eq!(finding.helper, "ghost");
        assert!(finding.result.fault);
        assert_eq!(finding.result.kind, ErrorKind::PathError);
        assert_eq!(finding.probes_run, 1);
        assert!(report.has_faults());
        assert_eq!(report.status.clients[0].helpers["ghost"].health, HealthLevel::Major);
    }

    #[test]
    fn test_diagnose_filter_excludes_other_clients() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join(".cursor/mcp.json"),
            r#"{"mcpServers": {"ghost": {"command": "medic-test-no-such-command"}}}"#,
        );
        let report = engine(&dir).diagnose(Some(ClientKind::Windsurf));
        assert!(report.status.clients.is_empty());
        assert!(report.isolation.is_empty());
        assert!(!report.has_faults());
    }

    #[cfg(unix)]
    #[test]
    fn test_dry_run_plans_without_touching_files() {
        let dir = TempDir::new().unwrap();
        let config = install_cursor(&dir);
        let before = fs::read_to_string(&config).unwrap();

        let summary = engine(&dir).repair(&RepairRequest {
            dry_run: true,
            ..Default::default()
        });
        assert!(summary.dry_run);
        assert!(summary.reports.is_empty());
        assert_eq!(summary.plans.len(), 1);
        assert_eq!(summary.plans[0].plan.fixes.len(), 1);
        assert_eq!(fs::read_to_string(&config).unwrap(), before);
        assert!(!dir.path().join(".medic/backups").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_repair_twice_second_run_plans_nothing() {
        let dir = TempDir::new().unwrap();
        let config = install_cursor(&dir);
        let engine = engine(&dir);

        let first = engine.repair(&RepairRequest::default());
        assert_eq!(first.reports.len(), 1);
        assert_eq!(first.reports[0].outcome, RepairOutcome::Succeeded);
        assert!(first.is_success());
        assert!(fs::read_to_string(&config).unwrap().contains("\"-y\""));
        assert_eq!(engine.history(None).unwrap().len(), 1);
        assert_eq!(engine.list_backups(None).unwrap().len(), 1);

        let second = engine.repair(&RepairRequest::default());
        assert!(second.plans[0].plan.is_empty());
        assert!(second.reports.is_empty());
        assert_eq!(engine.history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_backup_operations_through_engine() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join(".cursor/mcp.json");
        write(&config, r#"{"mcpServers": {}}"#);
        let engine = engine(&dir);

        let created = engine.create_backups(None).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(engine.list_backups(Some(ClientKind::Cursor)).unwrap().len(), 1);
        assert!(engine.list_backups(Some(ClientKind::Windsurf)).unwrap().is_empty());

        write(&config, r#"{"mcpServers": {"x": {"command": "y"}}}"#);
        engine.restore_backup(created[0].short_id()).unwrap();
        assert_eq!(fs::read_to_string(&config).unwrap(), r#"{"mcpServers": {}}"#);

        assert!(engine.delete_backup(&created[0].id).unwrap());
        assert!(!engine.delete_backup(&created[0].id).unwrap());
    }

    #[test]
    fn test_empty_inventory_is_redetected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(engine.inventory().clients.is_empty());

        write(&dir.path().join(".cursor/mcp.json"), r#"{"mcpServers": {}}"#);
        assert_eq!(engine.inventory().clients.len(), 1);
    }
}
