//! Template registry and rendering.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior, Value};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::TemplateError;
use crate::structural::{self, StructuralInput};

/// The full variable set a render call may need, across every template
/// name this crate knows about. Individual templates only reference the
/// subset relevant to them; `minijinja`'s strict-undefined mode only
/// objects to a variable a template actually *uses* that isn't present
/// here, so carrying the superset is harmless.
#[derive(Debug, Clone, Serialize)]
pub struct RenderVars {
    pub service_name: String,
    pub server_name: String,
    pub upstream_app: String,
    pub upstream_port: u16,
    pub upstream_proto: String,
    pub mcp_enabled: bool,
    pub auth_method: String,
    pub enable_quic: bool,
    pub template_revision: String,
    /// Only meaningful for the `mcp_location_block` template.
    pub mcp_path: String,
}

/// Optional hooks the orchestrator can install for tests: inspect or
/// rewrite the variable set before render, inspect (and optionally veto)
/// the rendered text after render. `None` in production.
#[derive(Default, Clone)]
pub struct TemplateHooks {
    pub pre_render: Option<Arc<dyn Fn(&str, RenderVars) -> RenderVars + Send + Sync>>,
    pub post_render: Option<Arc<dyn Fn(&str, String) -> Result<String, String> + Send + Sync>>,
    pub variables_override: Option<Arc<dyn Fn(&str) -> Option<RenderVars> + Send + Sync>>,
}

impl std::fmt::Debug for TemplateHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateHooks")
            .field("pre_render", &self.pre_render.is_some())
            .field("post_render", &self.post_render.is_some())
            .field("variables_override", &self.variables_override.is_some())
            .finish()
    }
}

/// Sandboxed renderer over a fixed, read-only set of named templates.
pub struct TemplateManager {
    env: Environment<'static>,
    names: RwLock<Vec<String>>,
    hooks: RwLock<TemplateHooks>,
}

const KNOWN_TEMPLATE_NAMES: &[&str] = &[
    "subdomain",
    "subfolder",
    "mcp-subdomain",
    "mcp-subfolder",
    "mcp_location_block",
];

impl TemplateManager {
    /// Load every `<name>.conf.jinja` / `<name>.jinja` file directly inside
    /// `template_dir` whose stem matches one of [`KNOWN_TEMPLATE_NAMES`].
    /// No include/extends resolution against the filesystem is configured,
    /// so a template body cannot reach outside the files loaded here.
    pub async fn load(template_dir: &Path) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_name| minijinja::AutoEscape::None);

        let mut loaded = Vec::new();
        let mut entries = tokio::fs::read_dir(template_dir)
            .await
            .map_err(|e| TemplateError::Io {
                path: template_dir.to_path_buf(),
                source: e,
            })?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| TemplateError::Io {
            path: template_dir.to_path_buf(),
            source: e,
        })? {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            let Some(name) = template_name_for(&path) else {
                continue;
            };
            if !KNOWN_TEMPLATE_NAMES.contains(&name.as_str()) {
                continue;
            }
            let source = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| TemplateError::Io { path: path.clone(), source: e })?;
            env.add_template_owned(name.clone(), source)
                .map_err(TemplateError::Invalid)?;
            debug!(template = %name, path = %path.display(), "loaded template");
            loaded.push(name);
        }

        for required in KNOWN_TEMPLATE_NAMES {
            if !loaded.iter().any(|n| n == required) {
                warn!(template = %required, "template not found in template directory");
            }
        }

        info!(count = loaded.len(), "template manager loaded templates");
        Ok(Self {
            env,
            names: RwLock::new(loaded),
            hooks: RwLock::new(TemplateHooks::default()),
        })
    }

    pub fn set_hooks(&self, hooks: TemplateHooks) {
        *self.hooks.write() = hooks;
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.names.read().iter().any(|n| n == name)
    }

    pub fn template_names(&self) -> Vec<String> {
        self.names.read().clone()
    }

    /// Render `name` with `vars`, then run the post-render structural
    /// check against `structural`. Neither render nor the structural check
    /// performs any I/O; both are pure CPU-bound work and never suspend.
    pub fn render(
        &self,
        name: &str,
        vars: RenderVars,
        structural_input: StructuralCheckMode,
    ) -> Result<String, TemplateError> {
        if !self.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }

        let hooks = self.hooks.read().clone();
        let vars = match hooks.variables_override.as_ref().and_then(|f| f(name)) {
            Some(overridden) => overridden,
            None => match hooks.pre_render.as_ref() {
                Some(f) => f(name, vars),
                None => vars,
            },
        };

        let mcp_enabled = vars.mcp_enabled;
        let enable_quic = vars.enable_quic;
        let auth_method = vars.auth_method.clone();

        let tmpl = self
            .env
            .get_template(name)
            .map_err(|e| TemplateError::Render { name: name.to_string(), source: e })?;
        let ctx = Value::from_serialize(&vars);
        let mut rendered = tmpl
            .render(ctx)
            .map_err(|e| TemplateError::Render { name: name.to_string(), source: e })?;

        if let Some(post) = hooks.post_render.as_ref() {
            rendered = post(name, rendered).map_err(|reason| TemplateError::Structural {
                name: name.to_string(),
                reason,
            })?;
        }

        if let StructuralCheckMode::Check = structural_input {
            let input = StructuralInput {
                body: &rendered,
                mcp_enabled,
                enable_quic,
                auth_method: &auth_method,
                require_oauth_discovery: true,
            };
            structural::check(&input).map_err(|reason| TemplateError::Structural {
                name: name.to_string(),
                reason,
            })?;
        }

        Ok(rendered)
    }
}

/// Whether [`TemplateManager::render`] should run the structural
/// post-render check. `mcp_location_block` renders a fragment, not a full
/// server block, so its caller (`MCPOperations`) checks structure only
/// after splicing the fragment into the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralCheckMode {
    Check,
    Skip,
}

fn template_name_for(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    // Strip a `.conf.jinja` or `.jinja` suffix, whichever matches, keeping
    // everything before it as the template name ("mcp-subdomain.conf.jinja"
    // -> "mcp-subdomain").
    for suffix in [".conf.jinja", ".jinja"] {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return Some(stem.to_string());
        }
    }
    None
}
