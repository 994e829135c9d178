//! Adding an MCP `location` block to an already-existing active config.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use swag_config_template::{structural, RenderVars, StructuralCheckMode, TemplateManager};

use crate::error::OrchestratorError;

static UPSTREAM_APP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"set\s+\$upstream_app\s+"([^"]*)"\s*;"#).unwrap());
static UPSTREAM_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"set\s+\$upstream_port\s+"([^"]*)"\s*;"#).unwrap());
static UPSTREAM_PROTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"set\s+\$upstream_proto\s+"([^"]*)"\s*;"#).unwrap());

/// Upstream values recovered by scanning an existing config's `set $upstream_*`
/// directives.
#[derive(Debug, Clone)]
pub struct RecoveredUpstream {
    pub upstream_app: String,
    pub upstream_port: u16,
    pub upstream_proto: String,
}

/// The default `location /` block's auth posture, recovered by inspecting
/// its include directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveredAuth {
    None,
    Basic,
    Ldap,
    Authelia,
    Authentik,
    Tinyauth,
}

impl RecoveredAuth {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveredAuth::None => "none",
            RecoveredAuth::Basic => "basic",
            RecoveredAuth::Ldap => "ldap",
            RecoveredAuth::Authelia => "authelia",
            RecoveredAuth::Authentik => "authentik",
            RecoveredAuth::Tinyauth => "tinyauth",
        }
    }
}

/// Splices an `mcp_location_block` render into an existing config's
/// outermost `server { ... }` block.
pub struct MCPOperations {
    templates: Arc<TemplateManager>,
}

impl MCPOperations {
    pub fn new(templates: Arc<TemplateManager>) -> Self {
        Self { templates }
    }

    pub fn recover_upstream(&self, body: &str, path: &std::path::Path) -> Result<RecoveredUpstream, OrchestratorError> {
        let app = capture_one(&UPSTREAM_APP_RE, body)
            .ok_or_else(|| OrchestratorError::malformed(path, "missing set $upstream_app directive"))?;
        let port_str = capture_one(&UPSTREAM_PORT_RE, body)
            .ok_or_else(|| OrchestratorError::malformed(path, "missing set $upstream_port directive"))?;
        let proto = capture_one(&UPSTREAM_PROTO_RE, body)
            .ok_or_else(|| OrchestratorError::malformed(path, "missing set $upstream_proto directive"))?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| OrchestratorError::malformed(path, format!("non-numeric upstream port: {port_str}")))?;
        Ok(RecoveredUpstream { upstream_app: app, upstream_port: port, upstream_proto: proto })
    }

    pub fn recover_auth(&self, body: &str) -> RecoveredAuth {
        if body.contains("authelia-location.conf") {
            RecoveredAuth::Authelia
        } else if body.contains("authentik-location.conf") {
            RecoveredAuth::Authentik
        } else if body.contains("ldap-location.conf") {
            RecoveredAuth::Ldap
        } else if body.contains("tinyauth-location.conf") {
            RecoveredAuth::Tinyauth
        } else if body.contains("auth_basic") {
            RecoveredAuth::Basic
        } else {
            RecoveredAuth::None
        }
    }

    /// Render the `mcp_location_block` fragment and splice it into `body`
    /// just before the outermost server block's closing brace. Fails with
    /// `Conflict` if a location with the same path already exists within
    /// that block.
    pub fn insert(
        &self,
        body: &str,
        path: &std::path::Path,
        mcp_path: &str,
    ) -> Result<String, OrchestratorError> {
        let (block_start, block_end) =
            structural::find_outermost_server_block(body).ok_or_else(|| {
                OrchestratorError::malformed(path, "no balanced server { } block found")
            })?;
        let server_block = &body[block_start..block_end];

        if has_location_for_path(server_block, mcp_path) {
            return Err(OrchestratorError::Conflict(format!(
                "a location block for {mcp_path} already exists"
            )));
        }

        let upstream = self.recover_upstream(body, path)?;
        let auth = self.recover_auth(body);

        let vars = RenderVars {
            service_name: String::new(),
            server_name: String::new(),
            upstream_app: upstream.upstream_app,
            upstream_port: upstream.upstream_port,
            upstream_proto: upstream.upstream_proto,
            mcp_enabled: true,
            auth_method: auth.as_str().to_string(),
            enable_quic: false,
            template_revision: env!("CARGO_PKG_VERSION").to_string(),
            mcp_path: mcp_path.to_string(),
        };
        let fragment = self.templates.render("mcp_location_block", vars, StructuralCheckMode::Skip)?;

        // Insert immediately before the closing brace of the server block,
        // preceded by one blank line.
        let closing_brace = block_end - 1;
        let mut out = String::with_capacity(body.len() + fragment.len() + 2);
        out.push_str(&body[..closing_brace]);
        out.push('\n');
        out.push_str(fragment.trim_end());
        out.push('\n');
        out.push_str(&body[closing_brace..]);
        Ok(out)
    }
}

/// True iff `server_block` already has a `location` directive for
/// `mcp_path`, regardless of an nginx match modifier (`=`, `^~`, `~`,
/// `~*`) preceding the path, so a hand-edited config using any of those
/// forms is still recognized as a conflict.
fn has_location_for_path(server_block: &str, mcp_path: &str) -> bool {
    let pattern = format!(
        r#"location\s+(?:=\s*|\^~\s*|~\*\s*|~\s*)?{}\s*\{{"#,
        regex::escape(mcp_path)
    );
    Regex::new(&pattern)
        .map(|re| re.is_match(server_block))
        .unwrap_or(false)
}

fn capture_one(re: &Regex, body: &str) -> Option<String> {
    let mut captures = re.captures_iter(body);
    let first = captures.next()?;
    if captures.next().is_some() {
        return None;
    }
    Some(first[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    async fn build_templates(dir: &std::path::Path) -> Arc<TemplateManager> {
        tokio::fs::write(
            dir.join("mcp_location_block.jinja"),
            "location = /mcp {\n proxy_pass $upstream_proto://$upstream_app:$upstream_port{{ mcp_path }};\n}\n",
        )
        .await
        .unwrap();
        for extra in ["subdomain", "subfolder", "mcp-subdomain", "mcp-subfolder"] {
            tokio::fs::write(dir.join(format!("{extra}.conf.jinja")), "server {}").await.unwrap();
        }
        Arc::new(TemplateManager::load(dir).await.unwrap())
    }

    fn sample_body() -> &'static str {
        "server {\n set $upstream_app \"jellyfin\";\n set $upstream_port \"8096\";\n set $upstream_proto \"http\";\n location / {\n  include /config/nginx/authelia-location.conf;\n  proxy_pass $upstream_proto://$upstream_app:$upstream_port;\n }\n}\n"
    }

    #[tokio::test]
    async fn recovers_upstream_values_from_set_directives() {
        let dir = tempdir().unwrap();
        let templates = Arc::new(TemplateManager::load(dir.path()).await.unwrap());
        let mcp = MCPOperations::new(templates);
        let recovered = mcp.recover_upstream(sample_body(), Path::new("jellyfin.subdomain.conf")).unwrap();
        assert_eq!(recovered.upstream_app, "jellyfin");
        assert_eq!(recovered.upstream_port, 8096);
        assert_eq!(recovered.upstream_proto, "http");
    }

    #[tokio::test]
    async fn recovers_authelia_from_include_marker() {
        let dir = tempdir().unwrap();
        let templates = Arc::new(TemplateManager::load(dir.path()).await.unwrap());
        let mcp = MCPOperations::new(templates);
        assert_eq!(mcp.recover_auth(sample_body()).as_str(), "authelia");
        assert_eq!(mcp.recover_auth("location / { }").as_str(), "none");
    }

    #[tokio::test]
    async fn insert_splices_block_before_closing_brace() {
        let dir = tempdir().unwrap();
        let templates = build_templates(dir.path()).await;
        let mcp = MCPOperations::new(templates);
        let out = mcp.insert(sample_body(), Path::new("jellyfin.subdomain.conf"), "/mcp").unwrap();
        assert!(out.contains("location = /mcp"));
        assert!(out.trim_end().ends_with('}'));
        assert!(out.contains("8096"));
    }

    #[tokio::test]
    async fn insert_twice_conflicts_on_second_call() {
        let dir = tempdir().unwrap();
        let templates = build_templates(dir.path()).await;
        let mcp = MCPOperations::new(templates);
        let once = mcp.insert(sample_body(), Path::new("jellyfin.subdomain.conf"), "/mcp").unwrap();
        let err = mcp.insert(&once, Path::new("jellyfin.subdomain.conf"), "/mcp").unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));
    }

    #[test]
    fn has_location_for_path_matches_exact_match_modifier() {
        let block = "server {\n location = /mcp {\n proxy_pass http://x;\n }\n}\n";
        assert!(has_location_for_path(block, "/mcp"));
        assert!(!has_location_for_path(block, "/mcp2"));
    }

    #[test]
    fn has_location_for_path_ignores_unrelated_locations() {
        let block = "server {\n location / {\n proxy_pass http://x;\n }\n}\n";
        assert!(!has_location_for_path(block, "/mcp"));
    }
}
