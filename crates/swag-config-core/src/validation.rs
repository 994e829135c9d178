//! Pure, deterministic, side-effect-free validation and normalization.
//!
//! Defensive string validation returning a descriptive error enum variant,
//! length caps checked before character-class scans, path traversal
//! rejected unconditionally.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

use crate::error::OrchestratorError;

pub const MAX_SERVER_NAME_LEN: usize = 253;
pub const MAX_UPSTREAM_APP_LEN: usize = 100;
pub const MAX_MCP_PATH_LEN: usize = 100;
pub const DEFAULT_MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

pub(crate) static CONFIG_NAME_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^(?P<service>[A-Za-z0-9_-]+)\.(?P<base>subdomain|subfolder)\.conf$").unwrap());

static DNS_LABEL_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());

static UPSTREAM_TOKEN_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

static MCP_PATH_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9/_-]+$").unwrap());

const WINDOWS_RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// The two halves recovered from a validated `config_name`.
pub struct ParsedConfigName {
    pub service_name: String,
    pub base_type: String,
}

pub fn validate_config_name(name: &str) -> Result<ParsedConfigName, OrchestratorError> {
    let caps = CONFIG_NAME_RE
        .captures(name)
        .ok_or_else(|| OrchestratorError::invalid("config_name", "must match <service>.<subdomain|subfolder>.conf"))?;
    Ok(ParsedConfigName {
        service_name: caps["service"].to_string(),
        base_type: caps["base"].to_string(),
    })
}

pub fn validate_domain(domain: &str) -> Result<String, OrchestratorError> {
    if domain.is_empty() || domain.len() > MAX_SERVER_NAME_LEN {
        return Err(OrchestratorError::invalid("server_name", "must be 1-253 characters"));
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(OrchestratorError::invalid("server_name", "must not start or end with a dot"));
    }
    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 || !DNS_LABEL_RE.is_match(label) {
            return Err(OrchestratorError::invalid("server_name", format!("invalid DNS label: {label}")));
        }
    }
    Ok(domain.to_ascii_lowercase())
}

pub fn validate_upstream_app(value: &str) -> Result<(), OrchestratorError> {
    if value.is_empty() || value.len() > MAX_UPSTREAM_APP_LEN {
        return Err(OrchestratorError::invalid("upstream_app", "must be 1-100 characters"));
    }
    let bare = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')).unwrap_or(value);
    if Ipv4Addr::from_str(value).is_ok() || Ipv6Addr::from_str(bare).is_ok() {
        return Ok(());
    }
    if UPSTREAM_TOKEN_RE.is_match(value) {
        return Ok(());
    }
    Err(OrchestratorError::invalid("upstream_app", "must be an IPv4/IPv6 address or [A-Za-z0-9._-]+ token"))
}

pub fn validate_port(port: u32) -> Result<u16, OrchestratorError> {
    if port == 0 || port > 65535 {
        return Err(OrchestratorError::invalid("upstream_port", "must be in [1, 65535]"));
    }
    Ok(port as u16)
}

pub fn validate_mcp_path(path: &str) -> Result<(), OrchestratorError> {
    if !path.starts_with('/') || path.len() > MAX_MCP_PATH_LEN {
        return Err(OrchestratorError::invalid("mcp_path", "must start with '/' and be at most 100 characters"));
    }
    if path.contains("..") || !MCP_PATH_RE.is_match(path) {
        return Err(OrchestratorError::invalid("mcp_path", "must contain only [A-Za-z0-9/_-] and no '..'"));
    }
    Ok(())
}

pub fn validate_file_path_safety(name: &str) -> Result<(), OrchestratorError> {
    let path = std::path::Path::new(name);
    if path.is_absolute() {
        return Err(OrchestratorError::invalid("name", "must not be an absolute path"));
    }
    for component in path.components() {
        let segment = match component {
            std::path::Component::Normal(s) => s.to_string_lossy(),
            std::path::Component::ParentDir => {
                return Err(OrchestratorError::invalid("name", "must not contain '..'"));
            }
            _ => return Err(OrchestratorError::invalid("name", "must not contain drive or root components")),
        };
        if segment.starts_with('.') {
            return Err(OrchestratorError::invalid("name", "segments must not start with '.'"));
        }
        let stem = segment.split('.').next().unwrap_or(&segment);
        if WINDOWS_RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
            return Err(OrchestratorError::invalid("name", format!("'{segment}' is a reserved name")));
        }
    }
    Ok(())
}

/// Normalize and validate full-content writes. Returns the NFC-normalized,
/// BOM-stripped bytes on success.
pub fn validate_content_safety(bytes: &[u8], max_bytes: usize) -> Result<Vec<u8>, OrchestratorError> {
    if bytes.len() > max_bytes {
        return Err(OrchestratorError::invalid("content", format!("exceeds maximum size of {max_bytes} bytes")));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| OrchestratorError::invalid("content", "must be valid UTF-8"))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let normalized: String = text.nfc().collect();

    if normalized.contains('\0') {
        return Err(OrchestratorError::invalid("content", "must not contain embedded NUL bytes"));
    }

    let total = normalized.chars().count().max(1);
    let control_count = normalized
        .chars()
        .filter(|c| {
            let cp = *c as u32;
            matches!(cp, 0x00..=0x1F | 0x7F..=0x9F) && !matches!(c, '\t' | '\r' | '\n')
        })
        .count();
    if (control_count * 100) > total {
        return Err(OrchestratorError::invalid("content", "contains too many control characters"));
    }

    if normalized.as_bytes().len() > max_bytes {
        return Err(OrchestratorError::invalid("content", format!("exceeds maximum size of {max_bytes} bytes")));
    }

    Ok(normalized.into_bytes())
}
