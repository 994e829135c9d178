//! Tail-reading access to the gateway's log files.
//!
//! The mapping from a [`LogKind`] to an on-disk path is deliberately not
//! hardcoded here, since it depends on the deployment; callers supply a
//! [`LogCatalog`] implementation.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::error::HealthError;

/// One of the fixed log categories the operation contract exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    NginxError,
    NginxAccess,
    Fail2ban,
    Letsencrypt,
    Renewal,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::NginxError => "nginx-error",
            LogKind::NginxAccess => "nginx-access",
            LogKind::Fail2ban => "fail2ban",
            LogKind::Letsencrypt => "letsencrypt",
            LogKind::Renewal => "renewal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nginx-error" => Some(LogKind::NginxError),
            "nginx-access" => Some(LogKind::NginxAccess),
            "fail2ban" => Some(LogKind::Fail2ban),
            "letsencrypt" => Some(LogKind::Letsencrypt),
            "renewal" => Some(LogKind::Renewal),
            _ => None,
        }
    }
}

/// Maps a log kind to its on-disk path. An embedding application may
/// supply any implementation; `swag-config-health` never assumes a
/// specific directory layout.
pub trait LogCatalog: Send + Sync {
    fn path_for(&self, kind: LogKind) -> PathBuf;
}

const CHUNK_SIZE: u64 = 64 * 1024;

/// Read the last `n` lines of the file at `path` without loading the
/// whole file into memory: read backward in fixed-size chunks, growing
/// the window until `n` newline-delimited lines are found or the start of
/// the file is reached.
pub async fn tail_lines(path: &Path, n: u32) -> Result<Vec<String>, HealthError> {
    if !(1..=1000).contains(&n) {
        return Err(HealthError::InvalidLineCount(n));
    }

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| map_open_error(path, e))?;
    let file_len = file
        .metadata()
        .await
        .map_err(|e| HealthError::Io { path: path.to_path_buf(), source: e })?
        .len();

    let mut collected_newlines = 0u32;
    let mut window_start = file_len;
    let mut buf: Vec<u8> = Vec::new();

    while window_start > 0 && collected_newlines <= n {
        let read_size = CHUNK_SIZE.min(window_start);
        window_start -= read_size;

        file.seek(std::io::SeekFrom::Start(window_start))
            .await
            .map_err(|e| HealthError::Io { path: path.to_path_buf(), source: e })?;
        let mut chunk = vec![0u8; read_size as usize];
        file.read_exact(&mut chunk)
            .await
            .map_err(|e| HealthError::Io { path: path.to_path_buf(), source: e })?;

        collected_newlines += chunk.iter().filter(|&&b| b == b'\n').count() as u32;

        let mut new_buf = chunk;
        new_buf.extend_from_slice(&buf);
        buf = new_buf;
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.lines().collect();
    // Drop a dangling trailing empty element caused by a trailing newline
    // in the source file, then keep only the last `n`.
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    let start = lines.len().saturating_sub(n as usize);
    debug!(path = %path.display(), requested = n, found = lines.len(), "tail_lines read window");
    Ok(lines[start..].iter().map(|s| s.to_string()).collect())
}

fn map_open_error(path: &Path, e: std::io::Error) -> HealthError {
    if e.kind() == std::io::ErrorKind::NotFound {
        HealthError::LogNotFound { kind: "unknown".to_string(), path: path.to_path_buf() }
    } else {
        HealthError::Io { path: path.to_path_buf(), source: e }
    }
}
