//! Multi-file transactions with deterministic lock ordering and rollback.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, warn};

use crate::atomic::{atomic_write, remove_if_exists};
use crate::error::FileOpsError;
use crate::locks::LockTable;

enum Op {
    Create { path: PathBuf, data: Vec<u8> },
    Overwrite { path: PathBuf, data: Vec<u8> },
    Delete { path: PathBuf },
}

impl Op {
    fn path(&self) -> &PathBuf {
        match self {
            Op::Create { path, .. } | Op::Overwrite { path, .. } | Op::Delete { path } => path,
        }
    }
}

/// Accumulates pending file operations and applies them as a unit: either
/// every operation succeeds, or prior-applied operations in this
/// transaction are rolled back to their pre-transaction state.
pub struct Transaction {
    ops: Vec<Op>,
}

impl Transaction {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn create(mut self, path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        self.ops.push(Op::Create {
            path: path.into(),
            data,
        });
        self
    }

    pub fn overwrite(mut self, path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        self.ops.push(Op::Overwrite {
            path: path.into(),
            data,
        });
        self
    }

    pub fn delete(mut self, path: impl Into<PathBuf>) -> Self {
        self.ops.push(Op::Delete { path: path.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all operations under locks acquired in sorted-path order.
    /// On failure, every operation applied so far in this call is undone
    /// before the error is returned.
    pub async fn commit(self, locks: &LockTable) -> Result<(), FileOpsError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        let paths: Vec<PathBuf> = self.ops.iter().map(|op| op.path().clone()).collect();
        let _guards = locks.lock_many(&paths).await;

        let mut snapshots: HashMap<PathBuf, Option<Vec<u8>>> = HashMap::new();
        let mut applied: Vec<usize> = Vec::new();
        let mut created: Vec<PathBuf> = Vec::new();

        for (idx, op) in self.ops.iter().enumerate() {
            let path = op.path();
            if !snapshots.contains_key(path) {
                let prior = tokio::fs::read(path).await.ok();
                snapshots.insert(path.clone(), prior);
            }

            let result = match op {
                Op::Create { path, data } => atomic_write(path, data.clone()).await,
                Op::Overwrite { path, data } => atomic_write(path, data.clone()).await,
                Op::Delete { path } => remove_if_exists(path).await.map(|_| ()),
            };

            match result {
                Ok(()) => {
                    applied.push(idx);
                    if matches!(op, Op::Create { .. }) && snapshots[path].is_none() {
                        created.push(path.clone());
                    }
                }
                Err(e) => {
                    error!(error = %e, "transaction step failed, rolling back");
                    rollback(&self.ops, &applied, &snapshots, &created).await;
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

async fn rollback(
    ops: &[Op],
    applied: &[usize],
    snapshots: &HashMap<PathBuf, Option<Vec<u8>>>,
    created: &[PathBuf],
) {
    for &idx in applied.iter().rev() {
        let path = ops[idx].path();
        if created.contains(path) {
            if let Err(e) = remove_if_exists(path).await {
                warn!(error = %e, ?path, "rollback: failed to remove created file");
            }
            continue;
        }
        if let Some(Some(prior)) = snapshots.get(path) {
            if let Err(e) = atomic_write(path, prior.clone()).await {
                warn!(error = %e, ?path, "rollback: failed to restore prior content");
            }
        }
    }
}

/// Convenience wrapper pairing a `Transaction` with the shared lock table it
/// must commit against, matching the lifetime shape of the other managers
/// that hold an `Arc<LockTable>`.
pub struct TransactionRunner {
    locks: Arc<LockTable>,
}

impl TransactionRunner {
    pub fn new(locks: Arc<LockTable>) -> Self {
        Self { locks }
    }

    pub async fn run(&self, txn: Transaction) -> Result<(), FileOpsError> {
        txn.commit(&self.locks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn commits_all_ops_when_all_succeed() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.conf");
        let b = dir.path().join("b.conf");
        tokio::fs::write(&a, b"old-a").await.unwrap();

        let locks = LockTable::new();
        let txn = Transaction::new()
            .overwrite(a.clone(), b"new-a".to_vec())
            .create(b.clone(), b"new-b".to_vec());
        txn.commit(&locks).await.unwrap();

        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"new-a");
        assert_eq!(tokio::fs::read(&b).await.unwrap(), b"new-b");
    }

    #[tokio::test]
    async fn rolls_back_created_file_on_later_failure() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.conf");
        let bad = dir.path().join("nonexistent-dir").join("b.conf");

        let locks = LockTable::new();
        let txn = Transaction::new()
            .create(a.clone(), b"new-a".to_vec())
            .overwrite(bad.clone(), b"x".to_vec());
        let result = txn.commit(&locks).await;
        assert!(result.is_err());
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn rolls_back_overwrite_to_prior_bytes_on_later_failure() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.conf");
        tokio::fs::write(&a, b"original").await.unwrap();
        let bad = dir.path().join("nonexistent-dir").join("b.conf");

        let locks = LockTable::new();
        let txn = Transaction::new()
            .overwrite(a.clone(), b"mutated".to_vec())
            .overwrite(bad.clone(), b"x".to_vec());
        let result = txn.commit(&locks).await;
        assert!(result.is_err());
        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"original");
    }
}
