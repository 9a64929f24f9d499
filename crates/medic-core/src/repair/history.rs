//! Append-only audit log of executed repairs, one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::clients::TargetKey;
use crate::repair::errors::RepairError;
use crate::repair::types::{HistoryEntry, HistoryOutcome};

#[derive(Debug)]
pub struct RepairHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RepairHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &HistoryEntry) -> Result<(), RepairError> {
        let line = serde_json::to_string(entry).map_err(|e| RepairError::History {
            message: format!("failed to serialize entry {}: {}", entry.id, e),
        })?;

        let _lock = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        debug!(
            event = "core.history.append_completed",
            entry_id = %entry.id,
            outcome = ?entry.outcome
        );
        Ok(())
    }

    /// Entries oldest first; `limit` keeps only the newest ones.
    ///
    /// A missing file is an empty history. Unreadable lines are skipped.
    pub fn load(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, RepairError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    event = "core.history.entry_skipped",
                    line = number + 1,
                    error = %e
                ),
            }
        }

        if let Some(limit) = limit
            && entries.len() > limit
        {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    /// Newest successful repair of a target.
    pub fn last_success(&self, key: &TargetKey) -> Result<Option<HistoryEntry>, RepairError> {
        Ok(self
            .load(None)?
            .into_iter()
            .rev()
            .find(|e| e.outcome == HistoryOutcome::Succeeded && &e.target() == key))
    }
}
