//! Aggregated error taxonomy for the configuration core.

use std::path::PathBuf;
use thiserror::Error;

use swag_config_backup::BackupError;
use swag_config_fileops::FileOpsError;
use swag_config_health::HealthError;
use swag_config_template::TemplateError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("malformed config {path}: {reason}")]
    MalformedConfig { path: PathBuf, reason: String },

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO failure during {operation} on {path}: {source}")]
    IOFailure { operation: String, path: PathBuf, source: FileOpsError },

    #[error("operation cancelled")]
    Cancelled,

    #[error("health probe error: {0}")]
    Probe(#[from] HealthError),

    #[error("backup error: {0}")]
    Backup(#[from] BackupError),
}

impl OrchestratorError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), reason: reason.into() }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedConfig { path: path.into(), reason: reason.into() }
    }

    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: FileOpsError) -> Self {
        Self::IOFailure { operation: operation.into(), path: path.into(), source }
    }
}

/// Bridges `FileOpsError::Cancelled` (raised mid-transaction) into the
/// core's own `Cancelled` variant rather than wrapping it as an I/O
/// failure.
impl From<FileOpsError> for OrchestratorError {
    fn from(e: FileOpsError) -> Self {
        match e {
            FileOpsError::Cancelled => OrchestratorError::Cancelled,
            FileOpsError::NotFound(path) => OrchestratorError::NotFound(path.display().to_string()),
            other => OrchestratorError::IOFailure {
                operation: "file operation".to_string(),
                path: other.path().cloned().unwrap_or_default(),
                source: other,
            },
        }
    }
}
