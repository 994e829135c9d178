//! Fileops error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileOpsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no space left on device while writing {0}")]
    NoSpace(PathBuf),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("operation cancelled")]
    Cancelled,
}

impl FileOpsError {
    /// The path the error pertains to, if any (`Cancelled` carries none).
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            FileOpsError::Io { path, .. } => Some(path),
            FileOpsError::NoSpace(path) => Some(path),
            FileOpsError::NotFound(path) => Some(path),
            FileOpsError::Cancelled => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::StorageFull || is_enospc(&source) {
            return Self::NoSpace(path);
        }
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path);
        }
        Self::Io { path, source }
    }
}

fn is_enospc(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(28)
}
