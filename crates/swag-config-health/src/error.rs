//! Health monitor error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("invalid domain for health probe: {0}")]
    InvalidDomain(String),

    #[error("timeout out of range (must be 1-300s): {0}")]
    InvalidTimeout(u64),

    #[error("no candidate URLs could even be attempted: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("log file not found for kind {kind}: {path}")]
    LogNotFound { kind: String, path: PathBuf },

    #[error("IO error reading log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line count out of range (must be 1-1000): {0}")]
    InvalidLineCount(u32),
}
