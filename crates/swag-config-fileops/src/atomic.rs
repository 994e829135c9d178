//! Atomic file write: temp file in the target directory, fsync, rename,
//! fsync of the parent directory. No operation here takes a lock; callers
//! (the orchestrator, `Transaction`) are responsible for holding the
//! relevant `PathGuard` for the duration.

use std::path::Path;

use tempfile::NamedTempFile;
use tokio::task;
use tracing::debug;

use crate::error::FileOpsError;

/// Write `data` to `path` atomically. On success the file at `path` either
/// has its old bytes or exactly `data`; it is never observed partially
/// written or truncated.
pub async fn atomic_write(path: &Path, data: Vec<u8>) -> Result<(), FileOpsError> {
    let path = path.to_path_buf();
    task::spawn_blocking(move || atomic_write_blocking(&path, &data))
        .await
        .expect("atomic_write blocking task panicked")
}

fn atomic_write_blocking(path: &Path, data: &[u8]) -> Result<(), FileOpsError> {
    use std::io::Write;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| FileOpsError::io(path, e))?;
    tmp.write_all(data).map_err(|e| FileOpsError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| FileOpsError::io(path, e))?;

    debug!(?path, bytes = data.len(), "persisting atomic write");
    tmp.persist(path)
        .map_err(|e| FileOpsError::io(path, e.error))?;

    sync_dir(dir, path)?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path, origin: &Path) -> Result<(), FileOpsError> {
    let dir_file = std::fs::File::open(dir).map_err(|e| FileOpsError::io(origin, e))?;
    dir_file.sync_all().map_err(|e| FileOpsError::io(origin, e))?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path, _origin: &Path) -> Result<(), FileOpsError> {
    Ok(())
}

/// Read a file fully, capped at `max_bytes`. Returns `NotFound` if missing.
pub async fn read_capped(path: &Path, max_bytes: u64) -> Result<Vec<u8>, FileOpsError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| FileOpsError::io(path, e))?;
    if meta.len() > max_bytes {
        return Err(FileOpsError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file exceeds {max_bytes} byte cap"),
            ),
        ));
    }
    tokio::fs::read(path).await.map_err(|e| FileOpsError::io(path, e))
}

/// Delete a file if present; returns `true` if it existed.
pub async fn remove_if_exists(path: &Path) -> Result<bool, FileOpsError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileOpsError::io(path, e)),
    }
}
