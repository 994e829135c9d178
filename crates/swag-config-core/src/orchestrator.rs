//! The façade composing every lower-level manager into the public
//! operation surface consumed by `swag-config-cli`.

use std::path::PathBuf;
use std::sync::Arc;

use swag_config_backup::{BackupError, BackupInfo, BackupManager};
use swag_config_fileops::LockTable;
use swag_config_health::{HealthMonitor, HealthRequest, HealthResult, LogCatalog, LogKind};
use swag_config_template::TemplateManager;
use tracing::info;

use crate::cancellation::CancellationToken;
use crate::error::OrchestratorError;
use crate::mcp::MCPOperations;
use crate::model::{
    ConfigFile, ConfigRequest, Defaults, EditRequest, ListFilter, MutationOutcome, RemoveRequest, UpdateKind,
    UpdateRequest,
};
use crate::operations::ConfigOperations;
use crate::resource::ResourceManager;
use crate::updaters::ConfigFieldUpdaters;

/// Construction parameters for [`Orchestrator::new`].
pub struct OrchestratorConfig {
    pub config_dir: PathBuf,
    pub template_dir: PathBuf,
    pub backup_retention_days: u32,
    pub max_file_bytes: u64,
    pub log_catalog: Arc<dyn LogCatalog>,
    pub defaults: Defaults,
}

/// Owns every manager in dependency order and exposes the full operation
/// set a CLI or other embedder drives the system through.
pub struct Orchestrator {
    locks: Arc<LockTable>,
    templates: Arc<TemplateManager>,
    backups: Arc<BackupManager>,
    health: HealthMonitor,
    log_catalog: Arc<dyn LogCatalog>,
    operations: ConfigOperations,
    backup_retention_days: u32,
    defaults: Defaults,
}

impl Orchestrator {
    pub async fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let locks = Arc::new(LockTable::new());
        let templates = Arc::new(TemplateManager::load(&config.template_dir).await?);
        let backups = Arc::new(BackupManager::new(&config.config_dir));
        let health = HealthMonitor::new()?;
        let resources = Arc::new(ResourceManager::new(&config.config_dir));
        let mcp = Arc::new(MCPOperations::new(templates.clone()));
        let updaters = Arc::new(ConfigFieldUpdaters::new(mcp.clone()));

        let operations = ConfigOperations::new(
            config.config_dir.clone(),
            locks.clone(),
            templates.clone(),
            backups.clone(),
            resources.clone(),
            updaters.clone(),
            config.max_file_bytes,
        );

        info!(config_dir = %config.config_dir.display(), "orchestrator initialized");
        Ok(Self {
            locks,
            templates,
            backups,
            health,
            log_catalog: config.log_catalog,
            operations,
            backup_retention_days: config.backup_retention_days,
            defaults: config.defaults,
        })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.has_template(name)
    }

    pub async fn list(&self, filter: ListFilter, cancel: &CancellationToken) -> Result<(Vec<ConfigFile>, usize), OrchestratorError> {
        self.operations.list(filter, cancel).await
    }

    pub async fn read(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<u8>, OrchestratorError> {
        self.operations.read(name, cancel).await
    }

    pub async fn create(&self, request: &ConfigRequest, cancel: &CancellationToken) -> Result<MutationOutcome, OrchestratorError> {
        self.operations.create(request, cancel).await
    }

    pub async fn overwrite(&self, request: &EditRequest, cancel: &CancellationToken) -> Result<MutationOutcome, OrchestratorError> {
        self.operations.overwrite(request, cancel).await
    }

    pub async fn update(&self, request: &UpdateRequest, cancel: &CancellationToken) -> Result<MutationOutcome, OrchestratorError> {
        self.operations.update_field(request, cancel).await
    }

    pub async fn add_mcp(
        &self,
        config_name: &str,
        mcp_path: &str,
        backup: bool,
        cancel: &CancellationToken,
    ) -> Result<MutationOutcome, OrchestratorError> {
        let request = UpdateRequest {
            config_name: config_name.to_string(),
            kind: UpdateKind::AddMcp { mcp_path: mcp_path.to_string() },
            backup,
        };
        self.operations.update_field(&request, cancel).await
    }

    pub async fn remove(&self, request: &RemoveRequest, cancel: &CancellationToken) -> Result<MutationOutcome, OrchestratorError> {
        self.operations.remove(request, cancel).await
    }

    pub async fn health(&self, request: &HealthRequest, cancel: &CancellationToken) -> Result<HealthResult, OrchestratorError> {
        cancel.check()?;
        Ok(self.health.probe(request).await?)
    }

    pub async fn logs(&self, kind: LogKind, lines: u32, cancel: &CancellationToken) -> Result<Vec<String>, OrchestratorError> {
        cancel.check()?;
        let path = self.log_catalog.path_for(kind);
        Ok(swag_config_health::tail_lines(&path, lines).await?)
    }

    pub async fn backups_list(&self, cancel: &CancellationToken) -> Result<Vec<BackupInfo>, OrchestratorError> {
        cancel.check()?;
        self.backups.list().await.map_err(to_orchestrator_error)
    }

    pub async fn backups_cleanup(&self, cancel: &CancellationToken) -> Result<usize, OrchestratorError> {
        cancel.check()?;
        self.backups
            .cleanup(&self.locks, self.backup_retention_days)
            .await
            .map_err(to_orchestrator_error)
    }

    pub fn defaults(&self) -> Defaults {
        self.defaults.clone()
    }

    /// Release every path lock and forget every template/backup handle.
    /// Called once at process shutdown; a fresh `Orchestrator` is required
    /// afterward for any further operation.
    pub fn shutdown(&self) {
        self.locks.clear();
        info!("orchestrator shutdown: lock table cleared");
    }
}

fn to_orchestrator_error(e: BackupError) -> OrchestratorError {
    OrchestratorError::Backup(e)
}
