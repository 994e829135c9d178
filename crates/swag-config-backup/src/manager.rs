//! Backup creation, listing, and age-based retention.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use swag_config_fileops::{atomic_write, list_files, remove_if_exists, LockTable};

use crate::error::BackupError;

const BACKUP_MARKER: &str = ".backup.";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Metadata recovered about a single backup file.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub file_name: String,
    pub original_name: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
}

/// Creates, lists, and retires backup copies of active configuration
/// files. Built entirely on `swag-config-fileops`; it never opens a raw
/// `std::fs`/`tokio::fs` handle itself.
pub struct BackupManager {
    dir: PathBuf,
    /// Last timestamp issued per original path, so two backups of the
    /// same file created within the same millisecond still get distinct
    /// names (the suffix is bumped forward by a millisecond rather than
    /// relying on the wall clock to advance on its own).
    last_issued: Mutex<HashMap<PathBuf, DateTime<Utc>>>,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    /// Copy `original`'s current bytes into a new `<name>.backup.<ts>`
    /// sibling file and return the new file's name. Caller must already
    /// hold `original`'s path lock; this does not re-lock it, but it does
    /// lock the computed backup path before writing (a distinct path from
    /// `original`, so this never contends with the caller's own lock).
    pub async fn create(
        &self,
        locks: &LockTable,
        original: &Path,
        data: &[u8],
    ) -> Result<String, BackupError> {
        let original_name = original
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BackupError::SourceNotFound(original.to_path_buf()))?
            .to_string();

        let timestamp = self.next_timestamp(original);
        let backup_name = format!("{original_name}{BACKUP_MARKER}{}", timestamp.format(TIMESTAMP_FORMAT));
        let backup_path = self.dir.join(&backup_name);

        let _guard = locks.lock(&backup_path).await;
        atomic_write(&backup_path, data.to_vec()).await?;
        info!(original = %original_name, backup = %backup_name, "created backup");
        Ok(backup_name)
    }

    /// Compute the next timestamp to use for a backup of `original`,
    /// bumping forward by one millisecond if it would collide with the
    /// last timestamp issued for this same original path. The backup
    /// name is only ever formatted at millisecond granularity, so the
    /// comparison truncates both sides to milliseconds rather than
    /// comparing at full (sub-millisecond) `DateTime` precision — two
    /// calls microseconds apart within the same millisecond would
    /// otherwise format to the same name and silently overwrite.
    fn next_timestamp(&self, original: &Path) -> DateTime<Utc> {
        let mut issued = self.last_issued.lock();
        let now = Utc::now();
        let stamp = match issued.get(original) {
            Some(prev) if prev.timestamp_millis() >= now.timestamp_millis() => *prev + Duration::milliseconds(1),
            _ => now,
        };
        issued.insert(original.to_path_buf(), stamp);
        stamp
    }

    /// List every backup in the managed directory, newest first.
    pub async fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let entries = list_files(&self.dir).await?;
        let mut backups: Vec<BackupInfo> = entries
            .into_iter()
            .filter_map(|entry| parse_backup_name(&entry.file_name).map(|(original_name, timestamp)| BackupInfo {
                file_name: entry.file_name,
                original_name,
                timestamp,
                size: entry.len,
            }))
            .collect();
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Delete every backup whose embedded timestamp is older than
    /// `retention_days`. Non-backup files in the directory are never
    /// inspected for deletion. Returns the number of files removed.
    pub async fn cleanup(&self, locks: &LockTable, retention_days: u32) -> Result<usize, BackupError> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let backups = self.list().await?;
        let mut removed = 0usize;

        for backup in backups {
            if backup.timestamp >= cutoff {
                continue;
            }
            let path = self.dir.join(&backup.file_name);
            let _guard = locks.lock(&path).await;
            match remove_if_exists(&path).await {
                Ok(true) => {
                    removed += 1;
                    debug!(backup = %backup.file_name, "removed expired backup");
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, backup = %backup.file_name, "failed to remove expired backup"),
            }
        }

        info!(removed, retention_days, "backup cleanup complete");
        Ok(removed)
    }
}

/// Split a backup file name at its first `.backup.` marker, recovering
/// the original file's name and the embedded UTC timestamp. Returns
/// `None` for anything that isn't a well-formed backup name.
fn parse_backup_name(file_name: &str) -> Option<(String, DateTime<Utc>)> {
    let idx = file_name.find(BACKUP_MARKER)?;
    let original_name = file_name[..idx].to_string();
    let ts_str = &file_name[idx + BACKUP_MARKER.len()..];
    let naive = NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT).ok()?;
    Some((original_name, naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swag_config_fileops::LockTable;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_list_recovers_original_name_and_size() {
        let dir = tempdir().unwrap();
        let mgr = BackupManager::new(dir.path());
        let locks = LockTable::new();
        let original = dir.path().join("plex.subdomain.conf");

        let name = mgr.create(&locks, &original, b"old bytes").await.unwrap();
        assert!(name.starts_with("plex.subdomain.conf.backup."));

        let listed = mgr.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].original_name, "plex.subdomain.conf");
        assert_eq!(listed[0].size, 9);
    }

    #[tokio::test]
    async fn two_backups_of_same_file_get_distinct_names() {
        let dir = tempdir().unwrap();
        let mgr = BackupManager::new(dir.path());
        let locks = LockTable::new();
        let original = dir.path().join("plex.subdomain.conf");

        let first = mgr.create(&locks, &original, b"v1").await.unwrap();
        let second = mgr.create(&locks, &original, b"v2").await.unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn next_timestamp_bumps_at_millisecond_granularity_even_when_subsecond_advances() {
        let mgr = BackupManager::new(PathBuf::from("/tmp/configs"));
        let original = PathBuf::from("plex.subdomain.conf");

        // Pin the "previous" timestamp a few milliseconds ahead of the
        // wall clock so the bump branch is exercised deterministically,
        // regardless of how fast this test happens to run. This mirrors
        // two real calls microseconds apart within the same millisecond,
        // which the old full-precision comparison let through as distinct.
        let pinned = Utc::now() + Duration::milliseconds(5);
        mgr.last_issued.lock().insert(original.clone(), pinned);

        let next = mgr.next_timestamp(&original);
        assert_eq!(next.timestamp_millis(), pinned.timestamp_millis() + 1);
        assert_ne!(
            next.format(TIMESTAMP_FORMAT).to_string(),
            pinned.format(TIMESTAMP_FORMAT).to_string()
        );
    }

    #[tokio::test]
    async fn list_ignores_non_backup_files() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("plex.subdomain.conf"), b"active")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("jellyfin.sample"), b"sample")
            .await
            .unwrap();

        let mgr = BackupManager::new(dir.path());
        let listed = mgr.list().await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_backups() {
        let dir = tempdir().unwrap();
        let old_name = format!(
            "plex.subdomain.conf.backup.{}",
            (Utc::now() - Duration::days(60)).format(TIMESTAMP_FORMAT)
        );
        let fresh_name = format!(
            "plex.subdomain.conf.backup.{}",
            Utc::now().format(TIMESTAMP_FORMAT)
        );
        tokio::fs::write(dir.path().join(&old_name), b"old").await.unwrap();
        tokio::fs::write(dir.path().join(&fresh_name), b"fresh").await.unwrap();

        let mgr = BackupManager::new(dir.path());
        let locks = LockTable::new();
        let removed = mgr.cleanup(&locks, 30).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(&old_name).exists());
        assert!(dir.path().join(&fresh_name).exists());
    }
}
