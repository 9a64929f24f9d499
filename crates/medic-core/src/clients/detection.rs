//! Client Inventory: discovering installed clients and their helpers.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clients::config_file::{ParsedHelpers, read_helpers};
use crate::clients::errors::ClientError;
use crate::clients::registry::get_backend;
use crate::clients::types::{
    ClientKind, ConfigIssue, DetectionReport, HelperProcess, HelperStatus, TargetClient,
};
use crate::config::{ClientsConfig, CustomClientConfig};
use crate::platform::HostContext;
use crate::process::{ProcessInfo, find_process, snapshot_processes};

const RUNTIME_VERSION_TIMEOUT: Duration = Duration::from_secs(3);

/// Enumerate the target clients installed on this host.
///
/// A client kind without a discoverable configuration file yields no
/// [`TargetClient`]. A file that exists but cannot be parsed still yields the
/// client (with no helpers) and a [`ConfigIssue`] describing the problem.
pub fn detect(host: &HostContext, settings: &ClientsConfig) -> DetectionReport {
    info!(
        event = "core.clients.detect_started",
        platform = %host.platform,
        compat = host.is_compat_layer()
    );

    let mut clients = Vec::new();
    let mut issues = Vec::new();

    for kind in ClientKind::builtin() {
        if settings.disabled.contains(kind) {
            debug!(event = "core.clients.detect_skipped", client = %kind, reason = "disabled");
            continue;
        }
        let Some(backend) = get_backend(*kind) else {
            continue;
        };
        let Some(config_path) = backend
            .config_candidates(host)
            .into_iter()
            .find(|p| p.is_file())
        else {
            debug!(event = "core.clients.detect_not_installed", client = %kind);
            continue;
        };

        let client = TargetClient {
            kind: *kind,
            display_name: backend.display_name().to_string(),
            config_path,
            log_dirs: backend.log_dirs(host),
            process_patterns: backend.process_patterns(),
            helper_processes: Vec::new(),
        };
        clients.push(load_helpers(client, &mut issues));
    }

    for custom in &settings.custom {
        if let Some(client) = custom_client(custom) {
            clients.push(load_helpers(client, &mut issues));
        }
    }

    let helper_runtime_version = helper_runtime_version();

    info!(
        event = "core.clients.detect_completed",
        client_count = clients.len(),
        issue_count = issues.len(),
        runtime = helper_runtime_version.as_deref().unwrap_or("none")
    );

    DetectionReport {
        platform: host.platform,
        is_compat_layer: host.is_compat_layer(),
        helper_runtime_version,
        clients,
        issues,
    }
}

fn custom_client(custom: &CustomClientConfig) -> Option<TargetClient> {
    if !custom.config_path.is_file() {
        debug!(
            event = "core.clients.detect_not_installed",
            client = %ClientKind::Custom,
            path = %custom.config_path.display()
        );
        return None;
    }
    Some(TargetClient {
        kind: ClientKind::Custom,
        display_name: custom.name.clone(),
        config_path: custom.config_path.clone(),
        log_dirs: custom.log_dir.iter().cloned().collect(),
        process_patterns: custom.process_names.clone(),
        helper_processes: Vec::new(),
    })
}

fn load_helpers(mut client: TargetClient, issues: &mut Vec<ConfigIssue>) -> TargetClient {
    match read_helpers(&client.config_path) {
        Ok(ParsedHelpers {
            helpers,
            issues: entry_issues,
        }) => {
            client.helper_processes = helpers;
            for (helper, message) in entry_issues {
                warn!(
                    event = "core.clients.helper_entry_invalid",
                    client = %client.kind,
                    helper = helper.as_deref().unwrap_or("-"),
                    message = %message
                );
                issues.push(ConfigIssue {
                    client: client.kind,
                    config_path: client.config_path.clone(),
                    helper,
                    message,
                });
            }
        }
        Err(e) => {
            warn!(
                event = "core.clients.config_read_failed",
                client = %client.kind,
                path = %client.config_path.display(),
                error = %e
            );
            issues.push(ConfigIssue {
                client: client.kind,
                config_path: client.config_path.clone(),
                helper: None,
                message: e.to_string(),
            });
        }
    }
    client
}

/// Re-read the helpers of previously detected clients.
///
/// Clients whose configuration file has disappeared are dropped; parse
/// problems become issues just as in [`detect`].
pub fn reload_clients(clients: Vec<TargetClient>) -> (Vec<TargetClient>, Vec<ConfigIssue>) {
    let mut issues = Vec::new();
    let mut kept = Vec::new();
    for client in clients {
        if !client.config_path.is_file() {
            info!(
                event = "core.clients.reload_dropped",
                client = %client.kind,
                path = %client.config_path.display()
            );
            continue;
        }
        kept.push(load_helpers(client, &mut issues));
    }
    (kept, issues)
}

/// Re-read the helper list of an already detected client from disk.
///
/// Returns `Ok(None)` when the configuration file has disappeared.
pub fn refresh_client(client: &TargetClient) -> Result<Option<TargetClient>, ClientError> {
    match read_helpers(&client.config_path) {
        Ok(parsed) => Ok(Some(TargetClient {
            helper_processes: parsed.helpers,
            ..client.clone()
        })),
        Err(ClientError::ConfigNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether the client application is running.
///
/// Failure to enumerate the process table degrades to `false`.
pub fn is_client_running(client: &TargetClient) -> bool {
    if client.process_patterns.is_empty() {
        return false;
    }
    match snapshot_processes() {
        Ok(processes) => find_process(&processes, &client.process_patterns, None).is_some(),
        Err(e) => {
            warn!(
                event = "core.clients.process_table_failed",
                client = %client.kind,
                error = %e
            );
            false
        }
    }
}

/// Fill in `last_known_status` of each helper from a process snapshot.
///
/// A helper is `Running` when a live process's command line carries the
/// helper's command and first distinguishing argument. Helpers of a client
/// that is not running are `Stopped`. When no snapshot is available the
/// status stays `Unknown`.
pub fn annotate_helper_status(
    client: &mut TargetClient,
    processes: Option<&[ProcessInfo]>,
    client_running: bool,
) {
    for helper in &mut client.helper_processes {
        helper.last_known_status = match processes {
            None => HelperStatus::Unknown,
            Some(_) if !client_running => HelperStatus::Stopped,
            Some(processes) => {
                if helper_process_alive(helper, processes) {
                    HelperStatus::Running
                } else {
                    HelperStatus::Stopped
                }
            }
        };
    }
}

fn helper_process_alive(helper: &HelperProcess, processes: &[ProcessInfo]) -> bool {
    let command_name = command_base_name(&helper.command);
    let pattern = match helper.args.iter().find(|a| !a.starts_with('-')) {
        Some(arg) => format!("{} {}", command_name, arg),
        None => command_name.clone(),
    };
    processes
        .iter()
        .filter(|p| p.status.is_alive() && !p.cmd_line.is_empty())
        .any(|p| crate::process::command_matches(&p.cmd_line, &pattern))
}

fn command_base_name(command: &str) -> String {
    Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| command.to_string())
}

/// Version reported by the helper runtime (`node --version`), if installed.
pub fn helper_runtime_version() -> Option<String> {
    crate::process::command_output_with_timeout("node", &["--version"], RUNTIME_VERSION_TIMEOUT)
        .filter(|v| !v.is_empty())
}
