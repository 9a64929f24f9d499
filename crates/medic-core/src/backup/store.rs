//! Snapshot storage for client configuration files.
//!
//! Layout of the backup directory:
//!
//! ```text
//! <medic_dir>/backups/
//!   index.json                                  # JSON array of BackupRecord
//!   cursor_20250301T120000123_1a2b3c4d.bak      # byte-exact snapshots
//! ```

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::backup::errors::BackupError;
use crate::backup::types::{BackupRecord, EnsuredBackup};
use crate::clients::{TargetClient, TargetKey};
use crate::config::{BackupConfig, Config};
use crate::repair::locks::{TargetGuard, TargetLocks};

const INDEX_FILE: &str = "index.json";
const MIN_ID_PREFIX: usize = 4;

#[derive(Debug)]
pub struct BackupStore {
    dir: PathBuf,
    max_per_target: usize,
    staleness: Duration,
    locks: Arc<TargetLocks>,
    /// Serializes read-modify-write cycles of the index across targets.
    index_lock: Mutex<()>,
}

impl BackupStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        max_per_target: usize,
        staleness_hours: u64,
        locks: Arc<TargetLocks>,
    ) -> Self {
        Self {
            dir: dir.into(),
            max_per_target: max_per_target.max(1),
            staleness: i64::try_from(staleness_hours)
                .ok()
                .and_then(Duration::try_hours)
                .unwrap_or(Duration::MAX),
            locks,
            index_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, settings: &BackupConfig, locks: Arc<TargetLocks>) -> Self {
        Self::new(
            config.backups_dir(),
            settings.max_per_target(),
            settings.staleness_hours(),
            locks,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn locks(&self) -> &Arc<TargetLocks> {
        &self.locks
    }

    fn acquire(&self, key: &TargetKey) -> Result<TargetGuard, BackupError> {
        self.locks
            .try_acquire(key)
            .ok_or_else(|| BackupError::TargetBusy {
                target: key.to_string(),
            })
    }

    /// Snapshot the client's configuration file and rotate old backups.
    pub fn create_backup(&self, client: &TargetClient) -> Result<BackupRecord, BackupError> {
        let guard = self.acquire(&client.key())?;
        self.create_backup_held(&guard, client, Utc::now())
    }

    /// [`Self::create_backup`] for a caller already holding the target key.
    pub fn create_backup_held(
        &self,
        guard: &TargetGuard,
        client: &TargetClient,
        created_at: DateTime<Utc>,
    ) -> Result<BackupRecord, BackupError> {
        debug_assert_eq!(guard.key(), &client.key());
        info!(
            event = "core.backup.create_started",
            client = %client.kind,
            path = %client.config_path.display()
        );

        if !client.config_path.is_file() {
            return Err(BackupError::ConfigNotFound {
                path: client.config_path.clone(),
            });
        }

        fs::create_dir_all(&self.dir)?;

        let id = uuid::Uuid::new_v4().to_string();
        let snapshot_path = self.dir.join(format!(
            "{}_{}_{}.bak",
            client.kind,
            created_at.format("%Y%m%dT%H%M%S%3f"),
            &id[..8]
        ));
        fs::copy(&client.config_path, &snapshot_path)?;

        let record = BackupRecord {
            id,
            client_kind: client.kind,
            source_config_path: client.config_path.clone(),
            snapshot_path,
            created_at,
            helper_processes_snapshot: client.helper_processes.clone(),
        };

        let _index = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = match self.load_index() {
            Ok(records) => records,
            Err(e) => {
                remove_snapshot(&record.snapshot_path);
                return Err(e);
            }
        };
        records.push(record.clone());
        self.rotate(&mut records, guard.key());
        if let Err(e) = self.save_index(&records) {
            remove_snapshot(&record.snapshot_path);
            return Err(e);
        }

        info!(
            event = "core.backup.create_completed",
            client = %client.kind,
            backup_id = %record.id,
            snapshot = %record.snapshot_path.display()
        );
        Ok(record)
    }

    /// Make sure a recent backup exists, creating one if none is younger
    /// than the staleness window.
    pub fn ensure_fresh_backup(
        &self,
        client: &TargetClient,
        now: DateTime<Utc>,
    ) -> Result<EnsuredBackup, BackupError> {
        let guard = self.acquire(&client.key())?;
        self.ensure_fresh_backup_held(&guard, client, now)
    }

    pub fn ensure_fresh_backup_held(
        &self,
        guard: &TargetGuard,
        client: &TargetClient,
        now: DateTime<Utc>,
    ) -> Result<EnsuredBackup, BackupError> {
        if let Some(newest) = self.list_for(&client.key())?.into_iter().next()
            && now - newest.created_at <= self.staleness
        {
            info!(
                event = "core.backup.ensure_fresh_reused",
                client = %client.kind,
                backup_id = %newest.id
            );
            return Ok(EnsuredBackup {
                record: newest,
                created: false,
            });
        }

        let record = self.create_backup_held(guard, client, now)?;
        Ok(EnsuredBackup {
            record,
            created: true,
        })
    }

    /// Copy a snapshot back over its live configuration path.
    pub fn restore(&self, id: &str) -> Result<BackupRecord, BackupError> {
        let record = self.get(id)?;
        let guard = self.acquire(&record.target())?;
        self.restore_held(&guard, &record.id)
    }

    pub fn restore_held(&self, guard: &TargetGuard, id: &str) -> Result<BackupRecord, BackupError> {
        let record = self.get(id)?;
        debug_assert_eq!(guard.key(), &record.target());
        info!(
            event = "core.backup.restore_started",
            backup_id = %record.id,
            path = %record.source_config_path.display()
        );

        if !record.snapshot_path.is_file() {
            warn!(
                event = "core.backup.restore_failed",
                backup_id = %record.id,
                reason = "snapshot missing"
            );
            return Err(BackupError::SnapshotMissing {
                id: record.id.clone(),
                path: record.snapshot_path.clone(),
            });
        }

        if let Some(parent) = record.source_config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Copy next to the target first so the live file is replaced in one step.
        let temp_file = record.source_config_path.with_extension("medic-restore");
        if let Err(e) = fs::copy(&record.snapshot_path, &temp_file) {
            cleanup_temp_file(&temp_file, &e);
            return Err(BackupError::IoError { source: e });
        }
        if let Err(e) = fs::rename(&temp_file, &record.source_config_path) {
            cleanup_temp_file(&temp_file, &e);
            return Err(BackupError::IoError { source: e });
        }

        info!(
            event = "core.backup.restore_completed",
            backup_id = %record.id,
            path = %record.source_config_path.display()
        );
        Ok(record)
    }

    /// Delete a backup record and its snapshot. Returns false for unknown ids.
    pub fn delete(&self, id: &str) -> Result<bool, BackupError> {
        let record = match self.get(id) {
            Ok(record) => record,
            Err(BackupError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let _guard = self.acquire(&record.target())?;

        let _index = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&record.snapshot_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BackupError::IoError { source: e }),
        }
        let mut records = self.load_index()?;
        records.retain(|r| r.id != record.id);
        self.save_index(&records)?;

        info!(event = "core.backup.delete_completed", backup_id = %record.id);
        Ok(true)
    }

    /// Backups of one target, newest first.
    pub fn list_for(&self, key: &TargetKey) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records: Vec<BackupRecord> = self
            .list_all()?
            .into_iter()
            .filter(|r| &r.target() == key)
            .collect();
        records.reverse();
        Ok(records)
    }

    /// Every backup, oldest first.
    pub fn list_all(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let _index = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.load_index()?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// Look up a record by full id or an unambiguous id prefix.
    pub fn get(&self, id: &str) -> Result<BackupRecord, BackupError> {
        let records = self.list_all()?;
        if let Some(record) = records.iter().find(|r| r.id == id) {
            return Ok(record.clone());
        }
        let mut matches = records
            .into_iter()
            .filter(|r| id.len() >= MIN_ID_PREFIX && r.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record),
            _ => Err(BackupError::NotFound { id: id.to_string() }),
        }
    }

    /// Whether the snapshot is byte-identical to the file at `path`.
    pub fn snapshot_matches(&self, record: &BackupRecord, path: &Path) -> bool {
        match (fs::read(&record.snapshot_path), fs::read(path)) {
            (Ok(snapshot), Ok(live)) => snapshot == live,
            _ => false,
        }
    }

    /// Keep the newest `max_per_target` records of each target.
    ///
    /// Other targets are locked for the duration of the pass; those held by
    /// another operation are left alone. A record whose snapshot cannot be
    /// removed stays in the index so a later pass retries.
    fn rotate(&self, records: &mut Vec<BackupRecord>, own_key: &TargetKey) {
        records.sort_by_key(|r| r.created_at);

        let mut groups: BTreeMap<TargetKey, Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            groups.entry(record.target()).or_default().push(i);
        }

        let mut doomed = Vec::new();
        let mut guards: Vec<TargetGuard> = Vec::new();
        for (key, indices) in groups {
            let excess = indices.len().saturating_sub(self.max_per_target);
            if excess == 0 {
                continue;
            }
            if &key != own_key {
                match self.locks.try_acquire(&key) {
                    Some(guard) => guards.push(guard),
                    None => {
                        debug!(event = "core.backup.rotate_skipped", target = %key);
                        continue;
                    }
                }
            }
            doomed.extend(indices.into_iter().take(excess));
        }

        let mut removed = Vec::new();
        for i in doomed {
            let record = &records[i];
            match fs::remove_file(&record.snapshot_path) {
                Ok(()) => removed.push(i),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => removed.push(i),
                Err(e) => warn!(
                    event = "core.backup.rotate_delete_failed",
                    backup_id = %record.id,
                    snapshot = %record.snapshot_path.display(),
                    error = %e
                ),
            }
        }

        drop(guards);

        if !removed.is_empty() {
            info!(event = "core.backup.rotate_completed", removed = removed.len());
            let mut i = 0;
            records.retain(|_| {
                let keep = !removed.contains(&i);
                i += 1;
                keep
            });
        }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let path = self.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::IoError { source: e }),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| BackupError::IndexCorrupt {
            path,
            message: e.to_string(),
        })
    }

    fn save_index(&self, records: &[BackupRecord]) -> Result<(), BackupError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.index_path();
        let json = serde_json::to_string_pretty(records).map_err(|e| BackupError::IoError {
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let temp_file = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&temp_file, json) {
            cleanup_temp_file(&temp_file, &e);
            return Err(BackupError::IoError { source: e });
        }
        if let Err(e) = fs::rename(&temp_file, &path) {
            cleanup_temp_file(&temp_file, &e);
            return Err(BackupError::IoError { source: e });
        }
        Ok(())
    }
}

fn remove_snapshot(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(
            event = "core.backup.snapshot_cleanup_failed",
            snapshot = %path.display(),
            error = %e
        );
    }
}

fn cleanup_temp_file(temp_file: &Path, original_error: &std::io::Error) {
    if let Err(cleanup_err) = fs::remove_file(temp_file) {
        warn!(
            event = "core.backup.temp_file_cleanup_failed",
            temp_file = %temp_file.display(),
            original_error = %original_error,
            cleanup_error = %cleanup_err
        );
    }
}
