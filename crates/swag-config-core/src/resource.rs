//! Read-only directory enumeration of the managed configuration directory.

use std::path::{Path, PathBuf};

use swag_config_fileops::{list_files, FileOpsError};

use crate::model::{ConfigFile, FileClassification};
use crate::validation::CONFIG_NAME_RE;

/// Enumerates active configs, sample files, and per-service samples.
/// Never mutates anything it reads.
pub struct ResourceManager {
    config_dir: PathBuf,
}

impl ResourceManager {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub async fn list_active(&self) -> Result<Vec<ConfigFile>, FileOpsError> {
        let entries = list_files(&self.config_dir).await?;
        Ok(entries
            .into_iter()
            .filter(|e| CONFIG_NAME_RE.is_match(&e.file_name))
            .map(|e| ConfigFile {
                name: e.file_name,
                path: e.path,
                size: e.len,
                modified: e.modified,
                classification: FileClassification::Active,
            })
            .collect())
    }

    pub async fn list_samples(&self) -> Result<Vec<ConfigFile>, FileOpsError> {
        let entries = list_files(&self.config_dir).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.file_name.ends_with(".sample"))
            .map(|e| ConfigFile {
                name: e.file_name,
                path: e.path,
                size: e.len,
                modified: e.modified,
                classification: FileClassification::Sample,
            })
            .collect())
    }

    pub async fn samples_for(&self, service: &str) -> Result<Vec<ConfigFile>, FileOpsError> {
        let samples = self.list_samples().await?;
        Ok(samples.into_iter().filter(|s| s.name.starts_with(service)).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<ConfigFile>, FileOpsError> {
        let entries = list_files(&self.config_dir).await?;
        Ok(entries
            .into_iter()
            .map(|e| {
                let classification = if CONFIG_NAME_RE.is_match(&e.file_name) {
                    FileClassification::Active
                } else if e.file_name.ends_with(".sample") {
                    FileClassification::Sample
                } else if e.file_name.contains(".backup.") {
                    FileClassification::Backup
                } else {
                    FileClassification::Other
                };
                ConfigFile { name: e.file_name, path: e.path, size: e.len, modified: e.modified, classification }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn touch(dir: &Path, name: &str) {
        tokio::fs::write(dir.join(name), b"x").await.unwrap();
    }

    #[tokio::test]
    async fn list_active_only_matches_active_pattern() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "plex.subdomain.conf").await;
        touch(dir.path(), "plex.subdomain.conf.sample").await;
        touch(dir.path(), "plex.subdomain.conf.backup.20260101_000000_000").await;

        let rm = ResourceManager::new(dir.path());
        let active = rm.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "plex.subdomain.conf");
    }

    #[tokio::test]
    async fn samples_for_filters_by_prefix() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "plex.subdomain.conf.sample").await;
        touch(dir.path(), "jellyfin.subdomain.conf.sample").await;

        let rm = ResourceManager::new(dir.path());
        let plex_samples = rm.samples_for("plex").await.unwrap();
        assert_eq!(plex_samples.len(), 1);
        assert_eq!(plex_samples[0].name, "plex.subdomain.conf.sample");
    }

    #[tokio::test]
    async fn list_all_classifies_every_kind() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "plex.subdomain.conf").await;
        touch(dir.path(), "plex.subdomain.conf.sample").await;
        touch(dir.path(), "plex.subdomain.conf.backup.20260101_000000_000").await;
        touch(dir.path(), "README.md").await;

        let rm = ResourceManager::new(dir.path());
        let all = rm.list_all().await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().any(|f| f.classification == FileClassification::Active));
        assert!(all.iter().any(|f| f.classification == FileClassification::Sample));
        assert!(all.iter().any(|f| f.classification == FileClassification::Backup));
        assert!(all.iter().any(|f| f.classification == FileClassification::Other));
    }
}
