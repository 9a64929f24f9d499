//! Predefined fixes keyed by (error kind, message shape).

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::clients::{HelperProcess, TargetClient};
use crate::diagnostics::classifier::{
    SHAPE_COMMAND_NOT_FOUND, SHAPE_ENV_MISSING, SHAPE_MODULE_NOT_FOUND, SHAPE_PERMISSION_DENIED,
};
use crate::diagnostics::{ClassifiedError, ErrorKind};
use crate::isolation::probes::is_placeholder;
use crate::platform::{HostContext, Platform};
use crate::repair::types::{ChangeAction, ChangeKind, RepairChange, RepairFix};

/// Launchers that are batch scripts on Windows and must run through `cmd /c`.
const WINDOWS_SHELL_LAUNCHERS: &[&str] = &["npx", "npm", "pnpm", "yarn", "uvx"];

/// Host facts the templates depend on.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub platform: Platform,
    /// `PATH` plus well-known install directories.
    pub search_dirs: Vec<PathBuf>,
    pub host_env: BTreeMap<String, String>,
    pub home: PathBuf,
}

impl TemplateContext {
    pub fn detect(host: &HostContext) -> Self {
        let mut search_dirs: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        for dir in well_known_dirs(host) {
            if !search_dirs.contains(&dir) {
                search_dirs.push(dir);
            }
        }
        Self {
            platform: host.platform,
            search_dirs,
            host_env: std::env::vars().collect(),
            home: host.home.clone(),
        }
    }

    /// Absolute path of an executable `command` on the extended search path.
    pub fn resolve(&self, command: &str) -> Option<PathBuf> {
        let paths: OsString = std::env::join_paths(&self.search_dirs).ok()?;
        which::which_in(command, Some(paths), &self.home).ok()
    }
}

fn well_known_dirs(host: &HostContext) -> Vec<PathBuf> {
    let home = &host.home;
    let mut dirs = match host.platform {
        Platform::Windows => vec![
            host.app_data_dir().join("npm"),
            home.join("scoop").join("shims"),
            home.join(".cargo").join("bin"),
        ],
        Platform::MacOs | Platform::Linux => vec![
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/homebrew/bin"),
            home.join(".volta").join("bin"),
            home.join(".local").join("bin"),
            home.join(".cargo").join("bin"),
            home.join(".bun").join("bin"),
        ],
    };

    // Every installed nvm node version, newest name last.
    let nvm = home.join(".nvm").join("versions").join("node");
    if let Ok(entries) = std::fs::read_dir(&nvm) {
        let mut versions: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path().join("bin"))
            .filter(|p| p.is_dir())
            .collect();
        versions.sort();
        versions.reverse();
        dirs.extend(versions);
    }
    dirs
}

fn base_name(command: &str) -> String {
    let name = Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| command.to_string());
    let lower = name.to_ascii_lowercase();
    for ext in [".exe", ".cmd", ".bat"] {
        if let Some(stem) = lower.strip_suffix(ext) {
            return name[..stem.len()].to_string();
        }
    }
    name
}

/// The helper an error is about: named by the error, or else the helper
/// whose command matches the error's subject.
fn target_helper<'a>(client: &'a TargetClient, error: &ClassifiedError) -> Option<&'a HelperProcess> {
    if let Some(name) = &error.helper {
        return client.helper(name);
    }
    let subject = base_name(error.subject.as_deref()?);
    client
        .helper_processes
        .iter()
        .find(|h| base_name(&h.command) == subject)
}

/// Look up the template fix for an error. `None` when no template applies.
pub fn template_fix(
    client: &TargetClient,
    error: &ClassifiedError,
    ctx: &TemplateContext,
) -> Option<RepairFix> {
    if !error.fixable {
        return None;
    }
    match (error.kind, error.shape.as_str()) {
        (ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND) => command_not_found(client, error, ctx),
        (ErrorKind::PathError, SHAPE_MODULE_NOT_FOUND) => module_not_found(client, error),
        (ErrorKind::PermissionError, SHAPE_PERMISSION_DENIED) => {
            permission_denied(client, error, ctx)
        }
        (ErrorKind::EnvironmentError, SHAPE_ENV_MISSING) => env_missing(client, error, ctx),
        _ => None,
    }
}

fn fix(error: &ClassifiedError, description: String, changes: Vec<RepairChange>, automatic: bool) -> RepairFix {
    RepairFix {
        for_error: error.clone(),
        description,
        changes,
        automatic,
        confidence: None,
        remediation: Vec::new(),
    }
}

fn manual_fix(error: &ClassifiedError, kind: ChangeKind, helper: Option<&str>, instructions: String) -> RepairFix {
    let change = RepairChange {
        kind,
        description: instructions.clone(),
        target_helper: helper.map(str::to_string),
        before_value: None,
        after_value: None,
        action: ChangeAction::Manual {
            instructions: instructions.clone(),
        },
    };
    RepairFix {
        remediation: vec![instructions.clone()],
        ..fix(error, instructions, vec![change], false)
    }
}

fn command_not_found(
    client: &TargetClient,
    error: &ClassifiedError,
    ctx: &TemplateContext,
) -> Option<RepairFix> {
    let helper = target_helper(client, error)?;
    let command = base_name(&helper.command);
    let missing = error
        .subject
        .as_deref()
        .map(base_name)
        .unwrap_or_else(|| command.clone());

    if missing == command {
        if ctx.platform == Platform::Windows
            && WINDOWS_SHELL_LAUNCHERS.contains(&command.to_lowercase().as_str())
        {
            let mut args = vec!["/c".to_string(), helper.command.clone()];
            args.extend(helper.args.iter().cloned());
            let changes = vec![
                RepairChange {
                    kind: ChangeKind::Command,
                    description: format!("Run {} through cmd", helper.command),
                    target_helper: Some(helper.name.clone()),
                    before_value: Some(helper.command.clone()),
                    after_value: Some("cmd".to_string()),
                    action: ChangeAction::SetCommand {
                        command: "cmd".to_string(),
                    },
                },
                argument_change(helper, args, format!("Prepend /c {}", helper.command)),
            ];
            return Some(fix(
                error,
                format!("Launch {} via cmd /c", helper.command),
                changes,
                true,
            ));
        }

        if let Some(resolved) = ctx.resolve(&command)
            && resolved != Path::new(&helper.command)
        {
            let resolved = resolved.display().to_string();
            let change = RepairChange {
                kind: ChangeKind::Command,
                description: format!("Use absolute path for {}", command),
                target_helper: Some(helper.name.clone()),
                before_value: Some(helper.command.clone()),
                after_value: Some(resolved.clone()),
                action: ChangeAction::SetCommand { command: resolved },
            };
            return Some(fix(
                error,
                format!("Point {} at the installed {}", helper.name, command),
                vec![change],
                true,
            ));
        }
    } else if let Some(resolved) = ctx.resolve(&missing)
        && let Some(dir) = resolved.parent()
    {
        // The helper's launcher exists but the program it runs does not.
        let existing = helper
            .env
            .get("PATH")
            .cloned()
            .or_else(|| ctx.host_env.get("PATH").cloned());
        let mut dirs = vec![dir.to_path_buf()];
        if let Some(existing) = &existing {
            dirs.extend(std::env::split_paths(existing));
        }
        let value = std::env::join_paths(dirs).ok()?.to_string_lossy().to_string();
        let change = RepairChange {
            kind: ChangeKind::Path,
            description: format!("Add {} to PATH of {}", dir.display(), helper.name),
            target_helper: Some(helper.name.clone()),
            before_value: existing,
            after_value: Some(value.clone()),
            action: ChangeAction::SetEnv {
                key: "PATH".to_string(),
                value,
            },
        };
        return Some(fix(
            error,
            format!("Make {} visible to {}", missing, helper.name),
            vec![change],
            true,
        ));
    }

    Some(manual_fix(
        error,
        ChangeKind::Package,
        Some(&helper.name),
        format!("Install {} or add its directory to PATH", missing),
    ))
}

fn argument_change(helper: &HelperProcess, args: Vec<String>, description: String) -> RepairChange {
    RepairChange {
        kind: ChangeKind::Argument,
        description,
        target_helper: Some(helper.name.clone()),
        before_value: Some(helper.args.join(" ")),
        after_value: Some(args.join(" ")),
        action: ChangeAction::SetArgs { args },
    }
}

fn module_not_found(client: &TargetClient, error: &ClassifiedError) -> Option<RepairFix> {
    let helper = target_helper(client, error)?;
    let module = error.subject.clone().unwrap_or_else(|| "the module".to_string());
    let has_yes = helper.args.iter().any(|a| a == "-y" || a == "--yes");

    if base_name(&helper.command).eq_ignore_ascii_case("npx") && !has_yes {
        let mut args = vec!["-y".to_string()];
        args.extend(helper.args.iter().cloned());
        return Some(fix(
            error,
            format!("Let npx install {} on demand", module),
            vec![argument_change(helper, args, "Add -y to npx arguments".to_string())],
            true,
        ));
    }

    Some(manual_fix(
        error,
        ChangeKind::Package,
        Some(&helper.name),
        format!("Install {} (e.g. npm install -g {})", module, module),
    ))
}

#[cfg(unix)]
fn permission_denied(
    client: &TargetClient,
    error: &ClassifiedError,
    ctx: &TemplateContext,
) -> Option<RepairFix> {
    use std::os::unix::fs::PermissionsExt;

    let helper = target_helper(client, error);
    let helper_command = helper.and_then(|h| {
        let path = Path::new(&h.command);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            crate::isolation::probes::locate_command(&h.command, None)
                .or_else(|| ctx.resolve(&h.command))
        }
    });

    let path = error
        .subject
        .as_deref()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(|| helper_command.clone())?;

    let mode = std::fs::metadata(&path).ok()?.permissions().mode() & 0o7777;
    let mut wanted = mode | 0o400;
    if helper_command.as_deref() == Some(path.as_path()) {
        wanted |= 0o100;
    }
    if wanted == mode {
        return None;
    }

    let change = RepairChange {
        kind: ChangeKind::Permission,
        description: format!("Grant owner access to {}", path.display()),
        target_helper: helper.map(|h| h.name.clone()),
        before_value: Some(format!("{:o}", mode)),
        after_value: Some(format!("{:o}", wanted)),
        action: ChangeAction::SetMode {
            path: path.clone(),
            mode: wanted,
        },
    };
    Some(fix(
        error,
        format!("Fix permissions of {}", path.display()),
        vec![change],
        true,
    ))
}

#[cfg(not(unix))]
fn permission_denied(
    _client: &TargetClient,
    _error: &ClassifiedError,
    _ctx: &TemplateContext,
) -> Option<RepairFix> {
    None
}

fn env_missing(
    client: &TargetClient,
    error: &ClassifiedError,
    ctx: &TemplateContext,
) -> Option<RepairFix> {
    let var = error.subject.as_deref()?;
    let helper = match &error.helper {
        Some(name) => client.helper(name)?,
        None => client
            .helper_processes
            .iter()
            .find(|h| h.env.contains_key(var))?,
    };

    match ctx.host_env.get(var).filter(|v| !is_placeholder(v)) {
        Some(value) => {
            let change = RepairChange {
                kind: ChangeKind::Environment,
                description: format!("Copy {} from the host environment", var),
                target_helper: Some(helper.name.clone()),
                before_value: Some(
                    match helper.env.get(var) {
                        Some(v) if !v.is_empty() => "<placeholder>",
                        _ => "<unset>",
                    }
                    .to_string(),
                ),
                after_value: Some("<host value>".to_string()),
                action: ChangeAction::SetEnv {
                    key: var.to_string(),
                    value: value.clone(),
                },
            };
            Some(fix(
                error,
                format!("Set {} for {}", var, helper.name),
                vec![change],
                false,
            ))
        }
        None => Some(manual_fix(
            error,
            ChangeKind::Environment,
            Some(&helper.name),
            format!("Set {} in the env of helper \"{}\"", var, helper.name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientKind;
    use tempfile::TempDir;

    fn client(helpers: Vec<HelperProcess>) -> TargetClient {
        TargetClient {
            kind: ClientKind::ClaudeDesktop,
            display_name: "Claude Desktop".to_string(),
            config_path: PathBuf::from("/x/config.json"),
            log_dirs: vec![],
            process_patterns: vec![],
            helper_processes: helpers,
        }
    }

    fn error(kind: ErrorKind, shape: &str, subject: Option<&str>, helper: Option<&str>) -> ClassifiedError {
        ClassifiedError {
            kind,
            message: "m".to_string(),
            raw_evidence: String::new(),
            shape: shape.to_string(),
            subject: subject.map(str::to_string),
            helper: helper.map(str::to_string),
            client: None,
            fixable: true,
        }
    }

    fn ctx(platform: Platform, dirs: Vec<PathBuf>) -> TemplateContext {
        TemplateContext {
            platform,
            search_dirs: dirs,
            host_env: BTreeMap::new(),
            home: std::env::temp_dir(),
        }
    }

    #[cfg(unix)]
    fn install(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_command_resolved_on_extended_path() {
        let dir = TempDir::new().unwrap();
        let npx = install(dir.path(), "npx");
        let c = client(vec![HelperProcess::new("fs", "npx")]);
        let e = error(ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND, Some("npx"), Some("fs"));

        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![dir.path().to_path_buf()])).unwrap();
        assert!(fix.automatic);
        assert_eq!(fix.changes[0].kind, ChangeKind::Command);
        assert_eq!(
            fix.changes[0].action,
            ChangeAction::SetCommand {
                command: npx.display().to_string()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_interpreter_extends_helper_path() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "node");
        let c = client(vec![HelperProcess::new("fs", "/usr/bin/npx")]);
        let e = error(ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND, Some("node"), Some("fs"));

        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![dir.path().to_path_buf()])).unwrap();
        assert_eq!(fix.changes[0].kind, ChangeKind::Path);
        match &fix.changes[0].action {
            ChangeAction::SetEnv { key, value } => {
                assert_eq!(key, "PATH");
                assert!(value.starts_with(&dir.path().display().to_string()));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_windows_launcher_wrapped_in_cmd() {
        let c = client(vec![HelperProcess::new("fs", "npx").with_args(["-y", "server-fs"])]);
        let e = error(ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND, Some("npx"), Some("fs"));

        let fix = template_fix(&c, &e, &ctx(Platform::Windows, vec![])).unwrap();
        assert!(fix.automatic);
        assert_eq!(fix.changes.len(), 2);
        assert_eq!(
            fix.changes[1].action,
            ChangeAction::SetArgs {
                args: vec!["/c", "npx", "-y", "server-fs"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            }
        );
    }

    #[test]
    fn test_unresolvable_command_is_manual_package_step() {
        let c = client(vec![HelperProcess::new("git", "uvx")]);
        let e = error(ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND, Some("uvx"), None);

        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![])).unwrap();
        assert!(!fix.automatic);
        assert!(!fix.is_applicable());
        assert_eq!(fix.changes[0].kind, ChangeKind::Package);
        assert_eq!(fix.changes[0].target_helper.as_deref(), Some("git"));
    }

    #[test]
    fn test_npx_module_not_found_adds_yes_flag() {
        let c = client(vec![HelperProcess::new("gh", "npx").with_args(["@scope/server-github"])]);
        let e = error(
            ErrorKind::PathError,
            SHAPE_MODULE_NOT_FOUND,
            Some("@scope/server-github"),
            Some("gh"),
        );
        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![])).unwrap();
        assert!(fix.automatic);
        assert_eq!(
            fix.changes[0].action,
            ChangeAction::SetArgs {
                args: vec!["-y".to_string(), "@scope/server-github".to_string()]
            }
        );

        let c = client(vec![HelperProcess::new("gh", "npx").with_args(["-y", "@scope/server-github"])]);
        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![])).unwrap();
        assert!(!fix.is_applicable());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_fix_adds_owner_read() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, "{}").unwrap();
        std::fs::set_permissions(&data, std::fs::Permissions::from_mode(0o200)).unwrap();

        let c = client(vec![HelperProcess::new("fs", "node")]);
        let e = error(
            ErrorKind::PermissionError,
            SHAPE_PERMISSION_DENIED,
            Some(&data.display().to_string()),
            Some("fs"),
        );
        let fix = template_fix(&c, &e, &ctx(Platform::Linux, vec![])).unwrap();
        assert_eq!(fix.changes[0].before_value.as_deref(), Some("200"));
        assert_eq!(
            fix.changes[0].action,
            ChangeAction::SetMode {
                path: data.clone(),
                mode: 0o600
            }
        );
    }

    #[test]
    fn test_env_missing_copies_host_value_with_confirmation() {
        let c = client(vec![HelperProcess::new("gh", "node").with_env("GITHUB_TOKEN", "")]);
        let e = error(
            ErrorKind::EnvironmentError,
            SHAPE_ENV_MISSING,
            Some("GITHUB_TOKEN"),
            Some("gh"),
        );

        let mut context = ctx(Platform::Linux, vec![]);
        let fix = template_fix(&c, &e, &context).unwrap();
        assert!(!fix.is_applicable());

        context
            .host_env
            .insert("GITHUB_TOKEN".to_string(), "ghp_abc".to_string());
        let fix = template_fix(&c, &e, &context).unwrap();
        assert!(!fix.automatic);
        assert!(fix.is_applicable());
        assert_eq!(fix.changes[0].before_value.as_deref(), Some("<unset>"));
        assert_eq!(fix.changes[0].after_value.as_deref(), Some("<host value>"));
    }

    #[test]
    fn test_unfixable_and_unknown_shapes_have_no_template() {
        let c = client(vec![HelperProcess::new("fs", "node")]);
        let mut e = error(ErrorKind::NetworkError, "network", None, Some("fs"));
        assert!(template_fix(&c, &e, &ctx(Platform::Linux, vec![])).is_none());
        e.kind = ErrorKind::PathError;
        e.shape = "custom".to_string();
        assert!(template_fix(&c, &e, &ctx(Platform::Linux, vec![])).is_none());
    }
}
