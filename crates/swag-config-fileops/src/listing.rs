//! Directory enumeration helpers shared by the resource and backup
//! managers. No locking here: listing is a snapshot read, not a mutation,
//! and callers that need a consistent view of one specific file still lock
//! that file's path themselves.

use std::path::{Path, PathBuf};

use crate::error::FileOpsError;

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub len: u64,
    pub modified: std::time::SystemTime,
}

/// List regular files directly inside `dir` (no recursion).
pub async fn list_files(dir: &Path) -> Result<Vec<DirEntryInfo>, FileOpsError> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FileOpsError::io(dir, e))?;

    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| FileOpsError::io(dir, e))?
    {
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| FileOpsError::io(entry.path(), e))?;
        if !metadata.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        entries.push(DirEntryInfo {
            path: entry.path(),
            file_name,
            len: metadata.len(),
            modified: metadata.modified().map_err(|e| FileOpsError::io(entry.path(), e))?,
        });
    }

    Ok(entries)
}

/// Verify `candidate` resolves to a path still contained within `root`,
/// rejecting any traversal outside the managed directory. Does not require
/// `candidate` to exist; it only requires that its lexical parent chain,
/// once `root` is canonicalized, stays inside `root`.
pub fn resolve_within(root: &Path, name: &str) -> Result<PathBuf, FileOpsError> {
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(FileOpsError::io(
            root.join(name),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unsafe path segment"),
        ));
    }
    Ok(root.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn list_files_skips_directories() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.conf"), b"x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("subdir")).await.unwrap();

        let entries = list_files(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "a.conf");
    }

    #[test]
    fn resolve_within_rejects_traversal() {
        let root = Path::new("/tmp/configs");
        assert!(resolve_within(root, "../etc/passwd").is_err());
        assert!(resolve_within(root, "a/b.conf").is_err());
        assert!(resolve_within(root, "plex.subdomain.conf").is_ok());
    }
}
