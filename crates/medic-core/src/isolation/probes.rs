//! Read-only environment probes.
//!
//! Probes that touch the network, or that run caller-supplied code, are
//! executed on helper threads and abandoned after the probe timeout. A probe
//! that times out counts as failed.

use regex::Regex;
use std::ffi::OsString;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, mpsc};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::clients::HelperProcess;

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "py", "ts"];

static ENDPOINT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(https?)://([^/\s:?#\]]+)(?::(\d+))?").ok());

/// Check run against a helper process.
pub type ProbeFn = dyn Fn(&HelperProcess) -> bool + Send + Sync;

/// Input shared by every probe of one traversal.
#[derive(Debug, Clone)]
pub struct ProbeContext<'a> {
    pub helper: &'a HelperProcess,
    pub timeout: Duration,
    /// Search path used to resolve bare command names. `None` uses `PATH`.
    pub search_path: Option<OsString>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(helper: &'a HelperProcess, timeout: Duration) -> Self {
        Self {
            helper,
            timeout,
            search_path: None,
        }
    }

    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }
}

/// What a probe saw. `subject` names the offending item when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub passed: bool,
    pub subject: Option<String>,
    pub evidence: String,
}

impl ProbeOutcome {
    fn pass(evidence: impl Into<String>) -> Self {
        Self {
            passed: true,
            subject: None,
            evidence: evidence.into(),
        }
    }

    fn fail(subject: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            passed: false,
            subject: Some(subject.into()),
            evidence: evidence.into(),
        }
    }
}

#[derive(Clone)]
pub enum Probe {
    /// The command is an existing path or is found on the search path.
    CommandResolvable,
    /// The resolved command has an execute bit (unix only).
    CommandExecutable,
    /// Every argument that looks like a local script exists.
    ScriptArgsExist,
    /// No environment value is empty or a placeholder.
    EnvValuesPresent,
    /// Every http(s) endpoint in args/env accepts a TCP connection.
    EndpointsReachable,
    Custom { name: String, check: Arc<ProbeFn> },
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Probe({})", self.name())
    }
}

impl Probe {
    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&HelperProcess) -> bool + Send + Sync + 'static,
    ) -> Self {
        Probe::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Probe::CommandResolvable => "command_resolvable",
            Probe::CommandExecutable => "command_executable",
            Probe::ScriptArgsExist => "script_args_exist",
            Probe::EnvValuesPresent => "env_values_present",
            Probe::EndpointsReachable => "endpoints_reachable",
            Probe::Custom { name, .. } => name.as_str(),
        }
    }

    pub fn run(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        let outcome = match self {
            Probe::CommandResolvable => command_resolvable(ctx),
            Probe::CommandExecutable => command_executable(ctx),
            Probe::ScriptArgsExist => script_args_exist(ctx.helper),
            Probe::EnvValuesPresent => env_values_present(ctx.helper),
            Probe::EndpointsReachable => endpoints_reachable(ctx),
            Probe::Custom { name, check } => {
                let check = Arc::clone(check);
                let helper = ctx.helper.clone();
                match run_bounded(ctx.timeout, move || check(&helper)) {
                    Some(true) => ProbeOutcome::pass(name.clone()),
                    Some(false) => ProbeOutcome::fail(name.clone(), format!("{} failed", name)),
                    None => ProbeOutcome::fail(name.clone(), format!("{} timed out", name)),
                }
            }
        };

        debug!(
            event = "core.isolation.probe_completed",
            probe = self.name(),
            helper = %ctx.helper.name,
            passed = outcome.passed
        );
        outcome
    }
}

/// Run `f` on a helper thread, giving up after `timeout`.
///
/// A timed-out thread is detached; its result is discarded.
fn run_bounded<T, F>(timeout: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).ok()
}

/// Directory relative commands and scripts of `helper` are resolved from.
fn working_dir(helper: &HelperProcess) -> PathBuf {
    helper
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve an executable `command` along `search_path` (or `PATH`).
pub fn resolve_command(
    command: &str,
    search_path: Option<&OsString>,
    cwd: &Path,
) -> Option<PathBuf> {
    let paths = search_path.cloned().or_else(|| std::env::var_os("PATH"));
    which::which_in(command, paths, cwd).ok()
}

/// Locate `command` without regard to its permission bits.
///
/// Only used to tell "present but not executable" apart from "missing";
/// executable commands are resolved with [`resolve_command`].
pub fn locate_command(command: &str, search_path: Option<&OsString>) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let search_path = search_path.cloned().or_else(|| std::env::var_os("PATH"))?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

fn command_resolvable(ctx: &ProbeContext<'_>) -> ProbeOutcome {
    let command = &ctx.helper.command;
    let cwd = working_dir(ctx.helper);
    if let Some(path) = resolve_command(command, ctx.search_path.as_ref(), &cwd) {
        return ProbeOutcome::pass(format!("{} -> {}", command, path.display()));
    }
    // Present without an execute bit; `CommandExecutable` reports it.
    if let Some(path) = locate_command(command, ctx.search_path.as_ref()) {
        return ProbeOutcome::pass(format!("{} -> {} (not executable)", command, path.display()));
    }
    ProbeOutcome::fail(
        command.clone(),
        format!("'{}' is not an existing path or on the search path", command),
    )
}

fn command_executable(ctx: &ProbeContext<'_>) -> ProbeOutcome {
    let command = &ctx.helper.command;
    let cwd = working_dir(ctx.helper);
    if let Some(path) = resolve_command(command, ctx.search_path.as_ref(), &cwd) {
        return ProbeOutcome::pass(format!("{} is executable", path.display()));
    }
    let Some(path) = locate_command(command, ctx.search_path.as_ref()) else {
        // Unresolvable commands are reported by `CommandResolvable`.
        return ProbeOutcome::pass("not resolved");
    };
    if is_executable(&path) {
        ProbeOutcome::pass(format!("{} is executable", path.display()))
    } else {
        let shown = path.display().to_string();
        ProbeOutcome::fail(shown.clone(), format!("{} has no execute permission", shown))
    }
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Arguments that name a local script file.
///
/// Relative paths are resolved against the helper's configured `cwd`. Without
/// one the client's working directory is unknown and they are skipped.
pub fn script_paths(helper: &HelperProcess) -> Vec<PathBuf> {
    helper
        .args
        .iter()
        .filter_map(|arg| {
            let expanded = match arg.strip_prefix("~/") {
                Some(rest) => dirs::home_dir()?.join(rest),
                None => PathBuf::from(arg),
            };
            let is_script = expanded
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if !is_script {
                return None;
            }
            if expanded.is_absolute() {
                Some(expanded)
            } else {
                helper.cwd.as_ref().map(|cwd| cwd.join(&expanded))
            }
        })
        .collect()
}

fn script_args_exist(helper: &HelperProcess) -> ProbeOutcome {
    match script_paths(helper).into_iter().find(|p| !p.exists()) {
        Some(missing) => {
            let shown = missing.display().to_string();
            ProbeOutcome::fail(shown.clone(), format!("script {} does not exist", shown))
        }
        None => ProbeOutcome::pass("all script arguments exist"),
    }
}

/// Whether an environment value is empty or an unfilled template value.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    let upper = value.to_uppercase();
    value.is_empty()
        || (value.starts_with('<') && value.ends_with('>'))
        || upper.starts_with("YOUR_")
        || upper.starts_with("YOUR-")
}

fn env_values_present(helper: &HelperProcess) -> ProbeOutcome {
    match helper.env.iter().find(|(_, value)| is_placeholder(value)) {
        Some((key, value)) => ProbeOutcome::fail(
            key.clone(),
            format!("{} has placeholder value '{}'", key, value),
        ),
        None => ProbeOutcome::pass("all environment values set"),
    }
}

/// `host:port` of every http(s) URL found in the helper's args and env.
pub fn endpoints(helper: &HelperProcess) -> Vec<String> {
    let Some(regex) = ENDPOINT.as_ref() else {
        return Vec::new();
    };
    let mut found: Vec<String> = Vec::new();
    for text in helper.args.iter().chain(helper.env.values()) {
        for caps in regex.captures_iter(text) {
            let scheme = caps.get(1).map(|m| m.as_str().to_lowercase());
            let Some(host) = caps.get(2).map(|m| m.as_str()) else {
                continue;
            };
            let port = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_else(|| {
                if scheme.as_deref() == Some("https") {
                    "443".to_string()
                } else {
                    "80".to_string()
                }
            });
            let endpoint = format!("{}:{}", host, port);
            if !found.contains(&endpoint) {
                found.push(endpoint);
            }
        }
    }
    found
}

/// Every endpoint is tried at once; the probe as a whole is bounded by one
/// timeout, and endpoints that have not answered by then are unreachable.
fn endpoints_reachable(ctx: &ProbeContext<'_>) -> ProbeOutcome {
    let endpoints = endpoints(ctx.helper);
    let timeout = ctx.timeout;
    let deadline = Instant::now() + timeout;

    let (tx, rx) = mpsc::channel();
    for (index, endpoint) in endpoints.iter().enumerate() {
        let tx = tx.clone();
        let target = endpoint.clone();
        // Name resolution can block well past the connect timeout.
        std::thread::spawn(move || {
            let reachable = target
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next())
                .is_some_and(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok());
            let _ = tx.send((index, reachable));
        });
    }
    drop(tx);

    let mut reachable = vec![false; endpoints.len()];
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok((index, ok)) => reachable[index] = ok,
            Err(_) => break,
        }
    }

    match endpoints.iter().zip(&reachable).find(|(_, ok)| !**ok) {
        Some((endpoint, _)) => ProbeOutcome::fail(
            endpoint.clone(),
            format!("connection to {} failed", endpoint),
        ),
        None => ProbeOutcome::pass("all endpoints reachable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[test]
    fn test_locate_command_on_search_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mytool"), "#!/bin/sh\n").unwrap();
        let search = OsString::from(dir.path());

        assert_eq!(
            locate_command("mytool", Some(&search)),
            Some(dir.path().join("mytool"))
        );
        assert_eq!(locate_command("absent-tool", Some(&search)), None);
    }

    #[test]
    fn test_command_resolvable_absolute() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "").unwrap();

        let helper = HelperProcess::new("h", tool.display().to_string());
        assert!(Probe::CommandResolvable.run(&ProbeContext::new(&helper, TIMEOUT)).passed);

        let helper = HelperProcess::new("h", "/definitely/not/here");
        let outcome = Probe::CommandResolvable.run(&ProbeContext::new(&helper, TIMEOUT));
        assert!(!outcome.passed);
        assert_eq!(outcome.subject.as_deref(), Some("/definitely/not/here"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_executable_checks_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();

        let helper = HelperProcess::new("h", tool.display().to_string());
        let ctx = ProbeContext::new(&helper, TIMEOUT);
        assert!(!Probe::CommandExecutable.run(&ctx).passed);

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(Probe::CommandExecutable.run(&ctx).passed);
    }

    #[test]
    fn test_script_args_exist() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("index.js");
        std::fs::write(&present, "").unwrap();
        let missing = dir.path().join("server.py");

        let helper = HelperProcess::new("h", "node").with_args([
            present.display().to_string(),
            "--port".to_string(),
            "relative/thing.js".to_string(),
        ]);
        assert!(Probe::ScriptArgsExist.run(&ProbeContext::new(&helper, TIMEOUT)).passed);

        let helper = HelperProcess::new("h", "python").with_args([missing.display().to_string()]);
        let outcome = Probe::ScriptArgsExist.run(&ProbeContext::new(&helper, TIMEOUT));
        assert!(!outcome.passed);
        assert_eq!(outcome.subject, Some(missing.display().to_string()));
    }

    #[test]
    fn test_relative_script_args_use_helper_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "").unwrap();

        let helper = HelperProcess::new("h", "node")
            .with_args(["index.js"])
            .with_cwd(dir.path());
        assert!(Probe::ScriptArgsExist.run(&ProbeContext::new(&helper, TIMEOUT)).passed);

        let helper = HelperProcess::new("h", "node")
            .with_args(["server.js"])
            .with_cwd(dir.path());
        let outcome = Probe::ScriptArgsExist.run(&ProbeContext::new(&helper, TIMEOUT));
        assert!(!outcome.passed);
        assert_eq!(
            outcome.subject,
            Some(dir.path().join("server.js").display().to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolvable_and_executable_agree_with_which() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let search = OsString::from(dir.path());
        let tool = dir.path().join("mytool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            resolve_command("mytool", Some(&search), dir.path()),
            Some(tool.clone())
        );
        let helper = HelperProcess::new("h", "mytool");
        let ctx = ProbeContext::new(&helper, TIMEOUT).with_search_path(search.clone());
        assert!(Probe::CommandResolvable.run(&ctx).passed);
        assert!(Probe::CommandExecutable.run(&ctx).passed);

        // Present but not executable: `which` skips it, the mode check reports it.
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(resolve_command("mytool", Some(&search), dir.path()), None);
        assert!(Probe::CommandResolvable.run(&ctx).passed);
        let outcome = Probe::CommandExecutable.run(&ctx);
        assert!(!outcome.passed);
        assert_eq!(outcome.subject, Some(tool.display().to_string()));
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("<your token>"));
        assert!(is_placeholder("YOUR_API_KEY_HERE"));
        assert!(!is_placeholder("ghp_123"));

        let helper = HelperProcess::new("h", "node")
            .with_env("A", "set")
            .with_env("B", "<fill me>");
        let outcome = Probe::EnvValuesPresent.run(&ProbeContext::new(&helper, TIMEOUT));
        assert!(!outcome.passed);
        assert_eq!(outcome.subject.as_deref(), Some("B"));
    }

    #[test]
    fn test_endpoints_extraction() {
        let helper = HelperProcess::new("h", "node")
            .with_args(["--url", "https://api.example.com/v1"])
            .with_env("DB", "http://localhost:5432/db")
            .with_env("DUP", "https://api.example.com/other");
        assert_eq!(
            endpoints(&helper),
            vec!["api.example.com:443", "localhost:5432"]
        );
    }

    #[test]
    fn test_endpoints_reachable_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let helper = HelperProcess::new("h", "node").with_args([format!("http://127.0.0.1:{}", port)]);
        assert!(Probe::EndpointsReachable.run(&ProbeContext::new(&helper, TIMEOUT)).passed);

        drop(listener);
        let outcome = Probe::EndpointsReachable.run(&ProbeContext::new(&helper, TIMEOUT));
        assert!(!outcome.passed);
        assert_eq!(outcome.subject, Some(format!("127.0.0.1:{}", port)));
    }

    #[test]
    fn test_unreachable_endpoints_share_one_timeout() {
        let helper = HelperProcess::new("h", "node").with_args([
            "http://10.255.255.1:81",
            "http://10.255.255.1:82",
            "http://10.255.255.1:83",
            "http://10.255.255.1:84",
        ]);
        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let outcome = Probe::EndpointsReachable.run(&ProbeContext::new(&helper, timeout));

        assert!(!outcome.passed);
        assert_eq!(outcome.subject.as_deref(), Some("10.255.255.1:81"));
        assert!(started.elapsed() < timeout * 3);
    }

    #[test]
    fn test_custom_probe_timeout_counts_as_failed() {
        let probe = Probe::custom("slow", |_| {
            std::thread::sleep(Duration::from_secs(5));
            true
        });
        let helper = HelperProcess::new("h", "node");
        let started = std::time::Instant::now();
        let outcome = probe.run(&ProbeContext::new(&helper, Duration::from_millis(50)));
        assert!(!outcome.passed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
