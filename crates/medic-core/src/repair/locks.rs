//! Serialization keys for mutating operations.
//!
//! A repair, backup or restore on a `(client kind, config path)` target holds
//! that target's key for its whole duration. A second operation on a held key
//! is rejected instead of queued; operations on different keys run freely.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::clients::TargetKey;

#[derive(Debug, Default)]
pub struct TargetLocks {
    held: Mutex<HashSet<TargetKey>>,
}

impl TargetLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the key, or `None` if another operation holds it.
    pub fn try_acquire(self: &Arc<Self>, key: &TargetKey) -> Option<TargetGuard> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(key.clone()) {
            debug!(event = "core.locks.acquire_rejected", target = %key);
            return None;
        }
        debug!(event = "core.locks.acquire_completed", target = %key);
        Some(TargetGuard {
            locks: Arc::clone(self),
            key: key.clone(),
        })
    }

    pub fn is_held(&self, key: &TargetKey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct TargetGuard {
    locks: Arc<TargetLocks>,
    key: TargetKey,
}

impl TargetGuard {
    pub fn key(&self) -> &TargetKey {
        &self.key
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.key);
        debug!(event = "core.locks.release_completed", target = %self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientKind;
    use std::path::PathBuf;

    fn key(path: &str) -> TargetKey {
        TargetKey {
            kind: ClientKind::Cursor,
            config_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = TargetLocks::new();
        let guard = locks.try_acquire(&key("/a")).unwrap();
        assert!(locks.try_acquire(&key("/a")).is_none());
        assert!(locks.is_held(&key("/a")));

        drop(guard);
        assert!(!locks.is_held(&key("/a")));
        assert!(locks.try_acquire(&key("/a")).is_some());
    }

    #[test]
    fn test_different_keys_are_independent() {
        let locks = TargetLocks::new();
        let _a = locks.try_acquire(&key("/a")).unwrap();
        let _b = locks.try_acquire(&key("/b")).unwrap();
        let other_kind = TargetKey {
            kind: ClientKind::Windsurf,
            config_path: PathBuf::from("/a"),
        };
        assert!(locks.try_acquire(&other_kind).is_some());
    }

    #[test]
    fn test_contention_across_threads() {
        let locks = TargetLocks::new();
        let guard = locks.try_acquire(&key("/a")).unwrap();
        let other = Arc::clone(&locks);
        let acquired = std::thread::spawn(move || other.try_acquire(&key("/a")).is_some())
            .join()
            .unwrap();
        assert!(!acquired);
        drop(guard);
    }
}
