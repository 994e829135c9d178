//! Backup manager error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    FileOps(#[from] swag_config_fileops::FileOpsError),
}
