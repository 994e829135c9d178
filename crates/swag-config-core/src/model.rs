//! Request/response data model shared across the core's public operations.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Subdomain,
    Subfolder,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Subdomain => "subdomain",
            BaseType::Subfolder => "subfolder",
        }
    }

    pub fn parse(s: &str) -> Result<Self, OrchestratorError> {
        match s {
            "subdomain" => Ok(BaseType::Subdomain),
            "subfolder" => Ok(BaseType::Subfolder),
            other => Err(OrchestratorError::invalid("base_type", format!("unknown base type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    None,
    Basic,
    Ldap,
    Authelia,
    Authentik,
    Tinyauth,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Basic => "basic",
            AuthMethod::Ldap => "ldap",
            AuthMethod::Authelia => "authelia",
            AuthMethod::Authentik => "authentik",
            AuthMethod::Tinyauth => "tinyauth",
        }
    }

    pub fn parse(s: &str) -> Result<Self, OrchestratorError> {
        match s {
            "none" => Ok(AuthMethod::None),
            "basic" => Ok(AuthMethod::Basic),
            "ldap" => Ok(AuthMethod::Ldap),
            "authelia" => Ok(AuthMethod::Authelia),
            "authentik" => Ok(AuthMethod::Authentik),
            "tinyauth" => Ok(AuthMethod::Tinyauth),
            other => Err(OrchestratorError::invalid("auth_method", format!("unknown auth method: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamProto {
    Http,
    Https,
}

impl UpstreamProto {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamProto::Http => "http",
            UpstreamProto::Https => "https",
        }
    }

    pub fn parse(s: &str) -> Result<Self, OrchestratorError> {
        match s {
            "http" => Ok(UpstreamProto::Http),
            "https" => Ok(UpstreamProto::Https),
            other => Err(OrchestratorError::invalid("upstream_proto", format!("unknown protocol: {other}"))),
        }
    }
}

/// `ConfigOperations::list` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Active,
    Samples,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClassification {
    Active,
    Sample,
    Backup,
    Other,
}

/// One entry in a directory listing.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip)]
    pub modified: SystemTime,
    pub classification: FileClassification,
}

/// Input to `ConfigOperations::create`.
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub config_name: String,
    pub server_name: String,
    pub upstream_app: String,
    pub upstream_port: u16,
    pub upstream_proto: UpstreamProto,
    pub mcp_enabled: bool,
    pub auth_method: AuthMethod,
    pub enable_quic: bool,
}

/// Input to `ConfigOperations::overwrite`.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub config_name: String,
    pub content: Vec<u8>,
    pub backup: bool,
}

/// The kind of surgical field update requested against an existing config.
#[derive(Debug, Clone)]
pub enum UpdateKind {
    Port(u16),
    Upstream(String),
    App { host: String, port: Option<u16> },
    AddMcp { mcp_path: String },
}

/// Input to `ConfigOperations::update_field`.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub config_name: String,
    pub kind: UpdateKind,
    pub backup: bool,
}

/// Input to `ConfigOperations::remove`.
#[derive(Debug, Clone)]
pub struct RemoveRequest {
    pub config_name: String,
    pub backup: bool,
}

/// Input to `HealthMonitor::probe`, re-exported under the core's vocabulary.
pub use swag_config_health::{HealthRequest, HealthResult};

/// Input to `HealthMonitor::get_logs` (via `LogCatalog`).
#[derive(Debug, Clone)]
pub struct LogsRequest {
    pub kind: swag_config_health::LogKind,
    pub lines: u32,
}

/// Outcome of a mutation that may have produced a backup.
#[derive(Debug, Clone, Default)]
pub struct MutationOutcome {
    pub backup_name: Option<String>,
    pub changed: bool,
}

/// Snapshot of environment-driven defaults, returned by `Orchestrator::defaults`.
#[derive(Debug, Clone, Serialize)]
pub struct Defaults {
    pub auth_method: AuthMethod,
    pub base_type: BaseType,
    pub quic_enabled: bool,
}
