//! Per-path mutual exclusion.
//!
//! Every mutation and read of a managed file goes through the lock keyed on
//! its canonicalized path, so two operations on the same file are always
//! serialized while operations on distinct files never block each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LockTable {
    locks: RwLock<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Holds a path's lock for the lifetime of the guard. The inner tokio guard
/// is over `()`; the value carried is irrelevant, only exclusivity matters.
pub struct PathGuard {
    _guard: OwnedMutexGuard<()>,
    pub path: PathBuf,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_for(&self, path: &Path) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.read().get(path) {
            return existing.clone();
        }
        let mut write = self.locks.write();
        write
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for a single path. The path need not exist on disk.
    pub async fn lock(&self, path: &Path) -> PathGuard {
        let handle = self.handle_for(path);
        let guard = handle.lock_owned().await;
        PathGuard {
            _guard: guard,
            path: path.to_path_buf(),
        }
    }

    /// Acquire locks for multiple paths in a deterministic order (sorted by
    /// canonical path string) so concurrent multi-path transactions can
    /// never deadlock against each other.
    pub async fn lock_many(&self, paths: &[PathBuf]) -> Vec<PathGuard> {
        let mut sorted: Vec<PathBuf> = paths.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for path in &sorted {
            guards.push(self.lock(path).await);
        }
        guards
    }

    /// Drop the table entry for a path once no concurrent task can still be
    /// waiting on it. Best-effort; used only at orchestrator teardown.
    pub fn evict(&self, path: &Path) {
        self.locks.write().remove(path);
    }

    pub fn clear(&self) {
        self.locks.write().clear();
    }
}
