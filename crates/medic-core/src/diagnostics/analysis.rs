//! Aggregate log analysis for one client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::clients::{ClientKind, ConfigIssue, TargetClient};
use crate::diagnostics::classifier::{LogClassifier, SHAPE_CONFIG_INVALID_JSON};
use crate::diagnostics::logs::{filter_since, locate_log_files, modified_since, read_tail, tagged_helper};
use crate::diagnostics::types::{ClassifiedError, ErrorKind};

/// Shape of records produced from configuration-file issues.
pub const SHAPE_CONFIG_ENTRY_INVALID: &str = "config_entry_invalid";

/// How log files are read during an analysis pass.
#[derive(Debug, Clone, Copy)]
pub struct LogScanOptions {
    /// Trailing lines read per file.
    pub max_lines: usize,
    /// Ignore evidence older than this.
    pub since: Option<DateTime<Utc>>,
}

impl Default for LogScanOptions {
    fn default() -> Self {
        Self {
            max_lines: crate::config::defaults::DEFAULT_MAX_LOG_LINES,
            since: None,
        }
    }
}

/// Result of analyzing one client's logs and configuration issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAnalysis {
    pub client: ClientKind,
    pub config_path: PathBuf,
    /// De-duplicated records in first-seen order.
    pub errors: Vec<ClassifiedError>,
    /// Best-effort "ok" flag per helper: false once a path or process error
    /// is attributed to it.
    pub helper_ok: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
    pub files_scanned: usize,
}

impl ClientAnalysis {
    pub fn errors_for(&self, helper: &str) -> impl Iterator<Item = &ClassifiedError> {
        self.errors
            .iter()
            .filter(move |e| e.helper.as_deref() == Some(helper))
    }

    /// Records not attributed to any helper.
    pub fn client_errors(&self) -> impl Iterator<Item = &ClassifiedError> {
        self.errors.iter().filter(|e| e.helper.is_none())
    }
}

/// Analyze a client: configuration issues first, then its log files.
///
/// Never fails; unreadable files and missing directories become warnings.
pub fn analyze_client(
    classifier: &LogClassifier,
    client: &TargetClient,
    issues: &[ConfigIssue],
    options: LogScanOptions,
) -> ClientAnalysis {
    let helper_names: Vec<String> = client
        .helper_processes
        .iter()
        .map(|h| h.name.clone())
        .collect();

    let mut errors: Vec<ClassifiedError> = issues
        .iter()
        .filter(|i| i.client == client.kind && i.config_path == client.config_path)
        .map(issue_to_error)
        .collect();

    let (files, mut warnings) = locate_log_files(&client.log_dirs);
    let mut files_scanned = 0;

    for file in &files {
        if let Some(since) = options.since
            && !modified_since(&file.path, since)
        {
            continue;
        }

        let lines = match read_tail(&file.path, options.max_lines) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(
                    event = "core.diagnostics.log_read_failed",
                    client = %client.kind,
                    path = %file.path.display(),
                    error = %e
                );
                warnings.push(format!("Could not read {}: {}", file.path.display(), e));
                continue;
            }
        };
        files_scanned += 1;

        let lines = match options.since {
            Some(since) => filter_since(lines, since),
            None => lines,
        };

        for line in &lines {
            let Some(error) = classifier.classify_line(line) else {
                continue;
            };
            let helper = file
                .helper
                .as_deref()
                .filter(|name| helper_names.iter().any(|h| h == name))
                .or_else(|| tagged_helper(line, &helper_names));
            errors.push(error.for_helper(helper));
        }
    }

    let errors = dedup(errors)
        .into_iter()
        .map(|e| e.for_client(client.kind))
        .collect::<Vec<_>>();

    let helper_ok = helper_names
        .iter()
        .map(|name| {
            let fatal = errors
                .iter()
                .any(|e| e.helper.as_deref() == Some(name) && e.kind.is_structurally_fatal());
            (name.clone(), !fatal)
        })
        .collect();

    info!(
        event = "core.diagnostics.analyze_completed",
        client = %client.kind,
        files_scanned = files_scanned,
        error_count = errors.len(),
        warning_count = warnings.len()
    );

    ClientAnalysis {
        client: client.kind,
        config_path: client.config_path.clone(),
        errors,
        helper_ok,
        warnings,
        files_scanned,
    }
}

fn issue_to_error(issue: &ConfigIssue) -> ClassifiedError {
    let (message, shape) = match &issue.helper {
        Some(helper) => (
            format!("Invalid entry for \"{}\": {}", helper, issue.message),
            SHAPE_CONFIG_ENTRY_INVALID,
        ),
        None => (
            "Invalid JSON in configuration".to_string(),
            SHAPE_CONFIG_INVALID_JSON,
        ),
    };
    ClassifiedError {
        kind: ErrorKind::ConfigError,
        message,
        raw_evidence: issue.message.clone(),
        shape: shape.to_string(),
        subject: Some(issue.config_path.display().to_string()),
        helper: issue.helper.clone(),
        client: Some(issue.client),
        fixable: false,
    }
}

/// Collapse repeated (helper, kind, message) records, keeping the first.
fn dedup(errors: Vec<ClassifiedError>) -> Vec<ClassifiedError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|e| {
            let (helper, kind, message) = e.dedup_key();
            seen.insert((helper.map(str::to_string), kind, message.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HelperProcess;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn client_with_logs(dir: &TempDir) -> TargetClient {
        TargetClient {
            kind: ClientKind::ClaudeDesktop,
            display_name: "Claude Desktop".to_string(),
            config_path: dir.path().join("claude_desktop_config.json"),
            log_dirs: vec![dir.path().join("logs")],
            process_patterns: vec![],
            helper_processes: vec![
                HelperProcess::new("fs", "npx"),
                HelperProcess::new("github", "node"),
                HelperProcess::new("web", "uvx"),
            ],
        }
    }

    #[test]
    fn test_analyze_attributes_and_dedups() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("mcp-server-fs.log"),
            "spawn npx ENOENT\nspawn npx ENOENT\nready\n",
        )
        .unwrap();
        fs::write(
            logs.join("mcp.log"),
            "[github] connect ECONNREFUSED 127.0.0.1:80\nSomething crashed\n",
        )
        .unwrap();

        let client = client_with_logs(&dir);
        let analysis = analyze_client(
            &LogClassifier::with_defaults(),
            &client,
            &[],
            LogScanOptions::default(),
        );

        assert_eq!(analysis.files_scanned, 2);
        assert_eq!(analysis.errors.len(), 3);
        assert_eq!(analysis.errors_for("fs").count(), 1);
        assert_eq!(
            analysis.errors_for("github").next().unwrap().kind,
            ErrorKind::NetworkError
        );
        assert_eq!(analysis.client_errors().count(), 1);
        assert!(analysis.errors.iter().all(|e| e.client == Some(ClientKind::ClaudeDesktop)));

        assert_eq!(analysis.helper_ok.get("fs"), Some(&false));
        assert_eq!(analysis.helper_ok.get("github"), Some(&true));
        assert_eq!(analysis.helper_ok.get("web"), Some(&true));
    }

    #[test]
    fn test_missing_log_dir_is_warning() {
        let dir = TempDir::new().unwrap();
        let client = client_with_logs(&dir);
        let analysis = analyze_client(
            &LogClassifier::with_defaults(),
            &client,
            &[],
            LogScanOptions::default(),
        );
        assert!(analysis.errors.is_empty());
        assert_eq!(analysis.warnings.len(), 1);
    }

    #[test]
    fn test_config_issues_become_config_errors() {
        let dir = TempDir::new().unwrap();
        let client = client_with_logs(&dir);
        let issues = vec![
            ConfigIssue {
                client: client.kind,
                config_path: client.config_path.clone(),
                helper: Some("broken".to_string()),
                message: "'command' is missing".to_string(),
            },
            ConfigIssue {
                client: ClientKind::Cursor,
                config_path: PathBuf::from("/elsewhere"),
                helper: None,
                message: "ignored".to_string(),
            },
        ];
        let analysis = analyze_client(
            &LogClassifier::with_defaults(),
            &client,
            &issues,
            LogScanOptions::default(),
        );
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].kind, ErrorKind::ConfigError);
        assert_eq!(analysis.errors[0].shape, SHAPE_CONFIG_ENTRY_INVALID);
        assert!(!analysis.errors[0].fixable);
    }

    #[test]
    fn test_since_drops_old_evidence() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("mcp-server-fs.log"),
            "2025-01-01T00:00:00Z spawn npx ENOENT\n2025-01-02T00:00:00Z connect ETIMEDOUT\n",
        )
        .unwrap();

        let client = client_with_logs(&dir);
        let options = LogScanOptions {
            max_lines: 100,
            since: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()),
        };
        let analysis = analyze_client(&LogClassifier::with_defaults(), &client, &[], options);
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].kind, ErrorKind::NetworkError);
        assert_eq!(analysis.helper_ok.get("fs"), Some(&true));
    }
}
