//! Environment-driven configuration, loaded through `clap`'s `env`
//! attribute. Flat rather than layered: there is no TOML file to merge,
//! just the fixed set of environment variables the gateway deployment
//! sets, with no safe default for the three mandatory paths.

use std::path::PathBuf;

use clap::Parser;
use swag_config_core::model::{AuthMethod, BaseType};

#[derive(Parser, Debug)]
#[command(name = "swag-config-cli", author, version, about = "Manual operation surface over the SWAG configuration core", long_about = None)]
pub struct Args {
    /// Path to the managed nginx configuration directory.
    #[arg(long, env = "CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Path to the directory of renderable templates.
    #[arg(long, env = "TEMPLATE_DIR")]
    pub template_dir: PathBuf,

    /// Root directory the log kinds are resolved under.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: PathBuf,

    /// Default auth method applied when a create request omits one.
    #[arg(long, env = "DEFAULT_AUTH_METHOD", default_value = "authelia")]
    pub default_auth_method: String,

    /// Default base type applied when a create request omits one.
    #[arg(long, env = "DEFAULT_CONFIG_BASE", default_value = "subdomain")]
    pub default_config_base: String,

    /// Default QUIC flag applied when a create request omits one.
    #[arg(long, env = "DEFAULT_QUIC_ENABLED", default_value_t = false)]
    pub default_quic_enabled: bool,

    /// Age, in days, after which a backup becomes eligible for cleanup.
    #[arg(long, env = "BACKUP_RETENTION_DAYS", default_value_t = 30)]
    pub backup_retention_days: u32,

    /// Default total health-probe budget, in seconds, when a request omits one.
    #[arg(long, env = "HEALTH_TIMEOUT_DEFAULT_S", default_value_t = 30)]
    pub health_timeout_default_s: u64,

    /// Maximum size, in bytes, accepted for a read or a full-content overwrite.
    #[arg(long, env = "MAX_FILE_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub max_file_bytes: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List managed configuration files.
    List {
        #[arg(long, value_enum, default_value = "active")]
        filter: ListFilterArg,
    },
    /// Print the contents of a managed file.
    Read { name: String },
    /// Create a new active file from a template.
    Create {
        config_name: String,
        server_name: String,
        upstream_app: String,
        upstream_port: u16,
        #[arg(long, default_value = "http")]
        upstream_proto: String,
        #[arg(long)]
        mcp_enabled: bool,
        #[arg(long)]
        auth_method: Option<String>,
        #[arg(long)]
        enable_quic: bool,
    },
    /// Replace a single field in an existing active file.
    Update {
        config_name: String,
        #[command(subcommand)]
        field: UpdateField,
        #[arg(long)]
        backup: bool,
    },
    /// Insert an MCP location block into an existing active file.
    AddMcp {
        config_name: String,
        #[arg(long, default_value = "/mcp")]
        mcp_path: String,
        #[arg(long)]
        backup: bool,
    },
    /// Delete an active file.
    Remove {
        config_name: String,
        #[arg(long)]
        backup: bool,
    },
    /// Probe a domain's health endpoints.
    Health {
        domain: String,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        follow_redirects: bool,
    },
    /// Print the tail of a log file.
    Logs {
        #[arg(value_enum)]
        kind: LogKindArg,
        #[arg(default_value_t = 100)]
        lines: u32,
    },
    /// List known backups.
    BackupsList,
    /// Delete backups older than the configured retention window.
    BackupsCleanup,
    /// Print the environment-derived defaults as JSON.
    Defaults,
}

#[derive(clap::Subcommand, Debug)]
pub enum UpdateField {
    Port { value: u16 },
    Upstream { value: String },
    App { host: String, port: Option<u16> },
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum ListFilterArg {
    All,
    Active,
    Samples,
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum LogKindArg {
    NginxError,
    NginxAccess,
    Fail2ban,
    Letsencrypt,
    Renewal,
}

impl LogKindArg {
    pub fn to_core(&self) -> swag_config_health::LogKind {
        match self {
            LogKindArg::NginxError => swag_config_health::LogKind::NginxError,
            LogKindArg::NginxAccess => swag_config_health::LogKind::NginxAccess,
            LogKindArg::Fail2ban => swag_config_health::LogKind::Fail2ban,
            LogKindArg::Letsencrypt => swag_config_health::LogKind::Letsencrypt,
            LogKindArg::Renewal => swag_config_health::LogKind::Renewal,
        }
    }
}

impl Args {
    pub fn default_auth_method(&self) -> anyhow::Result<AuthMethod> {
        AuthMethod::parse(&self.default_auth_method).map_err(|e| anyhow::anyhow!(e.to_string()))
    }

    pub fn default_base_type(&self) -> anyhow::Result<BaseType> {
        BaseType::parse(&self.default_config_base).map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

/// Maps a [`LogKind`] to `LOG_DIR/<kind>.log`, the simplest catalog that
/// satisfies a deployment's actual log layout (the kind-to-filename
/// mapping is deployment-specific, so `swag-config-health` never
/// hardcodes it). A real SWAG deployment would supply a catalog pointing
/// at its actual fail2ban/letsencrypt paths instead.
pub struct DefaultLogCatalog {
    root: PathBuf,
}

impl DefaultLogCatalog {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl swag_config_health::LogCatalog for DefaultLogCatalog {
    fn path_for(&self, kind: swag_config_health::LogKind) -> PathBuf {
        self.root.join(format!("{}.log", kind.as_str()))
    }
}
