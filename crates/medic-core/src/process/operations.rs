use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use sysinfo::{Pid as SysinfoPid, ProcessesToUpdate, System};
use tracing::debug;

use crate::process::errors::ProcessError;
use crate::process::types::{Pid, ProcessInfo, ProcessStatus};

/// Check if a process with the given PID is currently running
pub fn is_process_running(pid: u32) -> Result<bool, ProcessError> {
    let mut system = System::new();
    let pid_obj = SysinfoPid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid_obj]), true);
    Ok(system
        .process(pid_obj)
        .is_some_and(|p| ProcessStatus::from(p.status()).is_alive()))
}

/// Minimum length required for prefix matching to prevent false positives
/// with short names like "sh", "vi", "go"
const MIN_PREFIX_MATCH_LENGTH: usize = 5;

/// Extract the base name from a path, handling both Unix (/) and Windows (\) separators
fn extract_base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Check if a process name matches an expected name
///
/// 1. Exact match (case-insensitive)
/// 2. Base name match after stripping paths and a trailing `.exe`
/// 3. Prefix match only for names >= 5 characters (to avoid "sh" matching "bash")
pub fn process_name_matches(actual_name: &str, expected_name: &str) -> bool {
    let actual = actual_name.to_lowercase();
    let expected = expected_name.to_lowercase();

    if actual == expected {
        return true;
    }

    let actual_base = extract_base_name(&actual).trim_end_matches(".exe");
    let expected_base = extract_base_name(&expected).trim_end_matches(".exe");

    if actual_base == expected_base {
        return true;
    }

    if expected_base.len() >= MIN_PREFIX_MATCH_LENGTH && actual_base.starts_with(expected_base) {
        debug!(
            event = "core.process.prefix_match",
            actual = actual_name,
            expected = expected_name
        );
        return true;
    }

    false
}

/// Check if a command line matches a command pattern
///
/// Returns true if all significant words from the pattern appear in the command line.
/// Returns false for empty or flag-only patterns to prevent matching any command.
pub fn command_matches(cmd_line: &str, cmd_pattern: &str) -> bool {
    let pattern_words: Vec<&str> = cmd_pattern
        .split_whitespace()
        .filter(|w| !w.starts_with('-'))
        .collect();

    if pattern_words.is_empty() {
        return false;
    }

    let cmd_line_lower = cmd_line.to_lowercase();

    pattern_words
        .iter()
        .all(|word| cmd_line_lower.contains(&word.to_lowercase()))
}

/// Take a snapshot of the whole process table.
pub fn snapshot_processes() -> Result<Vec<ProcessInfo>, ProcessError> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    if system.processes().is_empty() {
        // Every host has at least our own process; an empty table means we
        // were not allowed to enumerate it.
        return Err(ProcessError::TableUnavailable {
            message: "process table is empty".to_string(),
        });
    }

    let processes = system
        .processes()
        .iter()
        .map(|(pid, process)| ProcessInfo {
            pid: Pid::from_raw(pid.as_u32()),
            name: process.name().to_string_lossy().to_string(),
            cmd_line: process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" "),
            status: ProcessStatus::from(process.status()),
            start_time: process.start_time(),
        })
        .collect();

    Ok(processes)
}

/// Find the first live process whose name matches any of `name_patterns`,
/// optionally also requiring its command line to match `command_pattern`.
///
/// When the OS hides the command line (common on macOS), the command check
/// is skipped and the name match alone decides.
pub fn find_process<'a>(
    processes: &'a [ProcessInfo],
    name_patterns: &[String],
    command_pattern: Option<&str>,
) -> Option<&'a ProcessInfo> {
    processes.iter().filter(|p| p.status.is_alive()).find(|p| {
        let name_matches = name_patterns
            .iter()
            .any(|pattern| process_name_matches(&p.name, pattern));
        if !name_matches {
            return false;
        }
        match command_pattern {
            Some(pattern) if !p.cmd_line.is_empty() => command_matches(&p.cmd_line, pattern),
            _ => true,
        }
    })
}

/// Run `program args...` and return its trimmed stdout, giving up after `timeout`.
///
/// Returns `None` if the program is missing, exits unsuccessfully, or does
/// not finish in time (in which case it is killed).
pub fn command_output_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Option<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut stdout = String::new();
                child.stdout.take()?.read_to_string(&mut stdout).ok()?;
                return Some(stdout.trim().to_string());
            }
            Ok(None) if Instant::now() >= deadline => {
                debug!(
                    event = "core.process.command_timed_out",
                    program = program,
                    timeout_ms = timeout.as_millis() as u64
                );
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(10)),
            Err(_) => return None,
        }
    }
}
