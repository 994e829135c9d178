//! `swag-config-cli` — a thin manual-operation binary over the
//! configuration core. Not the dispatch front-end an LLM assistant talks
//! to (that layer, with its action-name/parameter-bag parsing, request
//! logging, and rate limiting, lives elsewhere); this binary exists so
//! the core can be exercised by hand.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clap::Parser;
use config::{Args, Command, DefaultLogCatalog, ListFilterArg, UpdateField};
use swag_config_core::model::{
    ConfigRequest, Defaults, EditRequest, ListFilter, RemoveRequest, UpdateKind, UpdateRequest, UpstreamProto,
};
use swag_config_core::{CancellationToken, Orchestrator, OrchestratorConfig, OrchestratorError};
use swag_config_health::HealthRequest;

const EXIT_OK: u8 = 0;
const EXIT_UNHANDLED: u8 = 1;
const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_MISSING_TEMPLATE_DIR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(CliError::InvalidConfig(msg)) => {
            error!(%msg, "invalid configuration or environment");
            ExitCode::from(EXIT_INVALID_CONFIG)
        }
        Err(CliError::MissingTemplateDir(msg)) => {
            error!(%msg, "template directory missing");
            ExitCode::from(EXIT_MISSING_TEMPLATE_DIR)
        }
        Err(CliError::Unhandled(msg)) => {
            error!(%msg, "unhandled failure");
            ExitCode::from(EXIT_UNHANDLED)
        }
    }
}

enum CliError {
    InvalidConfig(String),
    MissingTemplateDir(String),
    Unhandled(String),
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::InvalidConfig(e.to_string())
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    if !args.template_dir.is_dir() {
        return Err(CliError::MissingTemplateDir(format!(
            "TEMPLATE_DIR {} does not exist or is not a directory",
            args.template_dir.display()
        )));
    }
    if !args.config_dir.is_dir() {
        return Err(CliError::InvalidConfig(format!(
            "CONFIG_DIR {} does not exist or is not a directory",
            args.config_dir.display()
        )));
    }

    let defaults = Defaults {
        auth_method: args.default_auth_method()?,
        base_type: args.default_base_type()?,
        quic_enabled: args.default_quic_enabled,
    };
    let log_catalog = Arc::new(DefaultLogCatalog::new(args.log_dir.clone()));

    let orchestrator = Orchestrator::new(OrchestratorConfig {
        config_dir: args.config_dir.clone(),
        template_dir: args.template_dir.clone(),
        backup_retention_days: args.backup_retention_days,
        max_file_bytes: args.max_file_bytes,
        log_catalog,
        defaults,
    })
    .await
    .map_err(to_cli_error)?;

    info!(config_dir = %args.config_dir.display(), "swag-config-cli ready");

    let cancel = CancellationToken::new();
    dispatch(&orchestrator, args.command, &cancel, args.health_timeout_default_s)
        .await
        .map_err(to_cli_error)?;

    orchestrator.shutdown();
    Ok(())
}

async fn dispatch(
    orch: &Orchestrator,
    command: Command,
    cancel: &CancellationToken,
    health_timeout_default_s: u64,
) -> Result<(), OrchestratorError> {
    match command {
        Command::List { filter } => {
            let filter = match filter {
                ListFilterArg::All => ListFilter::All,
                ListFilterArg::Active => ListFilter::Active,
                ListFilterArg::Samples => ListFilter::Samples,
            };
            let (files, count) = orch.list(filter, cancel).await?;
            for f in &files {
                println!("{}\t{}\t{:?}", f.name, f.size, f.classification);
            }
            println!("({count} total)");
        }
        Command::Read { name } => {
            let bytes = orch.read(&name, cancel).await?;
            print!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::Create {
            config_name,
            server_name,
            upstream_app,
            upstream_port,
            upstream_proto,
            mcp_enabled,
            auth_method,
            enable_quic,
        } => {
            let upstream_proto = UpstreamProto::parse(&upstream_proto)?;
            let auth_method = match auth_method {
                Some(ref s) => swag_config_core::model::AuthMethod::parse(s)?,
                None => orch.defaults().auth_method,
            };
            let request = ConfigRequest {
                config_name,
                server_name,
                upstream_app,
                upstream_port,
                upstream_proto,
                mcp_enabled,
                auth_method,
                enable_quic,
            };
            let outcome = orch.create(&request, cancel).await?;
            println!("created; backup={:?}", outcome.backup_name);
        }
        Command::Update { config_name, field, backup } => {
            let kind = match field {
                UpdateField::Port { value } => UpdateKind::Port(value),
                UpdateField::Upstream { value } => UpdateKind::Upstream(value),
                UpdateField::App { host, port } => UpdateKind::App { host, port },
            };
            let outcome = orch.update(&UpdateRequest { config_name, kind, backup }, cancel).await?;
            println!("updated={} backup={:?}", outcome.changed, outcome.backup_name);
        }
        Command::AddMcp { config_name, mcp_path, backup } => {
            let outcome = orch.add_mcp(&config_name, &mcp_path, backup, cancel).await?;
            println!("mcp added; backup={:?}", outcome.backup_name);
        }
        Command::Remove { config_name, backup } => {
            let outcome = orch.remove(&RemoveRequest { config_name, backup }, cancel).await?;
            println!("removed; backup={:?}", outcome.backup_name);
        }
        Command::Health { domain, timeout_secs, follow_redirects } => {
            let request = HealthRequest {
                domain,
                timeout_secs: timeout_secs.unwrap_or(health_timeout_default_s),
                follow_redirects,
            };
            let result = orch.health(&request, cancel).await?;
            println!(
                "success={} url={} status={:?} elapsed_ms={} error={:?}",
                result.success, result.url, result.status, result.elapsed_ms, result.error
            );
        }
        Command::Logs { kind, lines } => {
            let lines = orch.logs(kind.to_core(), lines, cancel).await?;
            for line in lines {
                println!("{line}");
            }
        }
        Command::BackupsList => {
            let backups = orch.backups_list(cancel).await?;
            for b in backups {
                println!("{}\t{}\t{}", b.file_name, b.original_name, b.size);
            }
        }
        Command::BackupsCleanup => {
            let removed = orch.backups_cleanup(cancel).await?;
            println!("removed {removed} backup(s)");
        }
        Command::Defaults => {
            let defaults = orch.defaults();
            println!("{}", serde_json::to_string_pretty(&defaults).unwrap_or_default());
        }
    }
    Ok(())
}

fn to_cli_error(e: OrchestratorError) -> CliError {
    match e {
        OrchestratorError::InvalidInput { field, reason } => {
            CliError::InvalidConfig(format!("invalid {field}: {reason}"))
        }
        other => CliError::Unhandled(other.to_string()),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
