//! Locating and reading helper-process log files.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

/// Per-helper log files are named `mcp-server-<name>.log`.
const HELPER_LOG_PREFIX: &str = "mcp-server-";
const LOG_EXTENSION: &str = "log";
const MAX_SCAN_DEPTH: usize = 3;

static LEADING_TIMESTAMP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\[?(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)",
    )
    .ok()
});

/// A log file found under one of a client's log directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    /// Helper the file belongs to, derived from its name. `None` for shared logs.
    pub helper: Option<String>,
}

/// Find the log files under `dirs`.
///
/// Returns the files plus one warning per directory that does not exist.
pub fn locate_log_files(dirs: &[PathBuf]) -> (Vec<LogFile>, Vec<String>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            warnings.push(format!("Log directory not found: {}", dir.display()));
            continue;
        }
        for entry in WalkDir::new(dir)
            .max_depth(MAX_SCAN_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION)
            {
                continue;
            }
            files.push(LogFile {
                path: path.to_path_buf(),
                helper: helper_from_file_name(path),
            });
        }
    }

    debug!(
        event = "core.diagnostics.log_files_located",
        file_count = files.len(),
        missing_dirs = warnings.len()
    );

    (files, warnings)
}

fn helper_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(HELPER_LOG_PREFIX)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Read at most the last `max_lines` lines of a file.
///
/// Invalid UTF-8 is replaced rather than failing the read.
pub fn read_tail(path: &Path, max_lines: usize) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(max_lines.min(4096));
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if tail.len() == max_lines {
            tail.pop_front();
        }
        if max_lines > 0 {
            let line = String::from_utf8_lossy(&buf);
            tail.push_back(line.trim_end_matches(['\r', '\n']).to_string());
        }
    }

    Ok(tail.into())
}

/// Whether the file was modified at or after `since`. Unknown mtimes count as fresh.
pub fn modified_since(path: &Path, since: DateTime<Utc>) -> bool {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified) >= since,
        Err(_) => true,
    }
}

/// Parse the ISO-8601 timestamp a log line starts with, if any.
pub fn leading_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let regex = LEADING_TIMESTAMP.as_ref()?;
    let raw = regex.captures(line)?.get(1)?.as_str().replacen(' ', "T", 1);

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.and_utc())
}

/// Drop lines older than `since`.
///
/// A line without a timestamp inherits the verdict of the preceding line;
/// lines before the first timestamp are kept.
pub fn filter_since(lines: Vec<String>, since: DateTime<Utc>) -> Vec<String> {
    let mut keep = true;
    lines
        .into_iter()
        .filter(|line| {
            if let Some(ts) = leading_timestamp(line) {
                keep = ts >= since;
            }
            keep
        })
        .collect()
}

/// Helper named by a `[<name>]` tag in a shared log line.
pub fn tagged_helper<'a>(line: &str, helper_names: &'a [String]) -> Option<&'a str> {
    helper_names
        .iter()
        .find(|name| line.contains(&format!("[{}]", name)))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_log_files_and_attribution() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mcp.log"), "x").unwrap();
        fs::write(dir.path().join("mcp-server-filesystem.log"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let missing = dir.path().join("missing");

        let (files, warnings) = locate_log_files(&[dir.path().to_path_buf(), missing]);
        assert_eq!(files.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing"));
        let helpers: Vec<_> = files.iter().map(|f| f.helper.as_deref()).collect();
        assert!(helpers.contains(&Some("filesystem")));
        assert!(helpers.contains(&None));
    }

    #[test]
    fn test_read_tail_limits_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let content: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        fs::write(&path, content).unwrap();

        let lines = read_tail(&path, 3).unwrap();
        assert_eq!(lines, vec!["line 8", "line 9", "line 10"]);
        assert!(read_tail(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_tail_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, b"ok\n\xff\xfe bad\r\n").unwrap();
        let lines = read_tail(&path, 10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("bad"));
    }

    #[test]
    fn test_leading_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            leading_timestamp("2025-03-01T12:00:00.000Z [fs] [info] up"),
            Some(expected)
        );
        assert_eq!(leading_timestamp("[2025-03-01 12:00:00] up"), Some(expected));
        assert_eq!(
            leading_timestamp("2025-03-01T14:00:00+02:00 up"),
            Some(expected)
        );
        assert_eq!(leading_timestamp("no timestamp here"), None);
    }

    #[test]
    fn test_filter_since_inherits_previous_verdict() {
        let since = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let lines = vec![
            "preamble".to_string(),
            "2025-03-01T11:00:00Z old error".to_string(),
            "  continuation of old".to_string(),
            "2025-03-01T12:30:00Z new error".to_string(),
            "  continuation of new".to_string(),
        ];
        let kept = filter_since(lines, since);
        assert_eq!(
            kept,
            vec!["preamble", "2025-03-01T12:30:00Z new error", "  continuation of new"]
        );
    }

    #[test]
    fn test_tagged_helper() {
        let names = vec!["fs".to_string(), "github".to_string()];
        assert_eq!(tagged_helper("2025 [github] [error] boom", &names), Some("github"));
        assert_eq!(tagged_helper("no tag", &names), None);
    }
}
