//! Narrow textual transforms applied to a single already-locked config
//! file, then re-validated structurally before being handed to `FileOps`.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use swag_config_template::structural::{self, StructuralInput};

use crate::error::OrchestratorError;
use crate::mcp::MCPOperations;
use crate::model::UpdateKind;
use crate::validation;

static PORT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*set\s+\$upstream_port\s+"[^"]*"\s*;\s*$"#).unwrap());
static APP_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*set\s+\$upstream_app\s+"[^"]*"\s*;\s*$"#).unwrap());
static AUTH_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(authelia|authentik|ldap|tinyauth)-location\.conf|auth_basic\b"#).unwrap()
});

/// Applies a single [`UpdateKind`] to a file's bytes, returning the new
/// bytes. Callers are responsible for holding the target path's lock,
/// taking a backup first if requested, and writing the result atomically.
pub struct ConfigFieldUpdaters {
    mcp: Arc<MCPOperations>,
}

impl ConfigFieldUpdaters {
    pub fn new(mcp: Arc<MCPOperations>) -> Self {
        Self { mcp }
    }

    pub fn apply(
        &self,
        path: &std::path::Path,
        body: &str,
        kind: &UpdateKind,
    ) -> Result<String, OrchestratorError> {
        let updated = match kind {
            UpdateKind::Port(port) => replace_single_line(body, &PORT_LINE_RE, path, "upstream_port", &format!("    set $upstream_port \"{port}\";"))?,
            UpdateKind::Upstream(app) => {
                validation::validate_upstream_app(app)?;
                replace_single_line(body, &APP_LINE_RE, path, "upstream_app", &format!("    set $upstream_app \"{app}\";"))?
            }
            UpdateKind::App { host, port } => {
                validation::validate_upstream_app(host)?;
                let mut updated = replace_single_line(body, &APP_LINE_RE, path, "upstream_app", &format!("    set $upstream_app \"{host}\";"))?;
                if let Some(port) = port {
                    validation::validate_port(*port as u32)?;
                    updated = replace_single_line(&updated, &PORT_LINE_RE, path, "upstream_port", &format!("    set $upstream_port \"{port}\";"))?;
                }
                updated
            }
            UpdateKind::AddMcp { mcp_path } => {
                validation::validate_mcp_path(mcp_path)?;
                self.mcp.insert(body, path, mcp_path)?
            }
        };

        // `mcp_location_block` (§4.7) is a narrow fragment that never carries the
        // OAuth discovery endpoint that only the full `mcp-*` templates render; a
        // surgical `add_mcp` must not retroactively demand one. The discovery
        // requirement only applies if the file already carried it before this edit.
        let oauth_already_present = body.contains("/.well-known/oauth-authorization-server");
        recheck_structure(&updated, path, oauth_already_present)?;
        Ok(updated)
    }
}

fn replace_single_line(
    body: &str,
    pattern: &Regex,
    path: &std::path::Path,
    field: &str,
    replacement: &str,
) -> Result<String, OrchestratorError> {
    let matches: Vec<_> = pattern.find_iter(body).collect();
    if matches.len() != 1 {
        return Err(OrchestratorError::malformed(
            path,
            format!("expected exactly one {field} line, found {}", matches.len()),
        ));
    }
    let m = matches[0];
    let mut out = String::with_capacity(body.len());
    out.push_str(&body[..m.start()]);
    out.push_str(replacement);
    out.push_str(&body[m.end()..]);
    Ok(out)
}

fn recheck_structure(body: &str, path: &std::path::Path, require_oauth_discovery: bool) -> Result<(), OrchestratorError> {
    let mcp_enabled = body.contains("location /mcp");
    let enable_quic = body.contains("listen 443 quic");
    let auth_method = recovered_auth_str(body);
    let input = StructuralInput { body, mcp_enabled, enable_quic, auth_method: &auth_method, require_oauth_discovery };
    structural::check(&input).map_err(|reason| OrchestratorError::malformed(path, reason))
}

fn recovered_auth_str(body: &str) -> String {
    match AUTH_METHOD_RE.captures(body) {
        Some(caps) if caps.get(1).is_some() => caps[1].to_string(),
        Some(_) => "basic".to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swag_config_template::TemplateManager;
    use tempfile::tempdir;

    fn body_with_port(port: u16) -> String {
        format!(
            "server {{\n set $upstream_app \"plex\";\n set $upstream_port \"{port}\";\n set $upstream_proto \"http\";\n location / {{\n  include /config/nginx/authelia-location.conf;\n  proxy_pass $upstream_proto://$upstream_app:$upstream_port;\n }}\n}}\n"
        )
    }

    async fn mcp_ops() -> Arc<MCPOperations> {
        let dir = tempdir().unwrap();
        let templates = Arc::new(TemplateManager::load(dir.path()).await.unwrap());
        Arc::new(MCPOperations::new(templates))
    }

    #[tokio::test]
    async fn port_update_replaces_exactly_one_line() {
        let updaters = ConfigFieldUpdaters::new(mcp_ops().await);
        let body = body_with_port(32400);
        let out = updaters.apply(std::path::Path::new("plex.subdomain.conf"), &body, &UpdateKind::Port(32401)).unwrap();
        assert!(out.contains("set $upstream_port \"32401\";"));
        assert!(!out.contains("32400"));
    }

    #[tokio::test]
    async fn port_update_fails_with_zero_or_multiple_matches() {
        let updaters = ConfigFieldUpdaters::new(mcp_ops().await);
        let no_port = "server { set $upstream_app \"plex\"; }";
        let err = updaters.apply(std::path::Path::new("plex.subdomain.conf"), no_port, &UpdateKind::Port(1)).unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedConfig { .. }));
    }

    #[tokio::test]
    async fn app_update_rewrites_host_and_port_together() {
        let updaters = ConfigFieldUpdaters::new(mcp_ops().await);
        let body = body_with_port(32400);
        let out = updaters
            .apply(
                std::path::Path::new("plex.subdomain.conf"),
                &body,
                &UpdateKind::App { host: "newhost".to_string(), port: Some(9000) },
            )
            .unwrap();
        assert!(out.contains("set $upstream_app \"newhost\";"));
        assert!(out.contains("set $upstream_port \"9000\";"));
    }

    #[tokio::test]
    async fn app_update_rejects_out_of_range_port() {
        let updaters = ConfigFieldUpdaters::new(mcp_ops().await);
        let body = body_with_port(32400);
        let err = updaters
            .apply(
                std::path::Path::new("plex.subdomain.conf"),
                &body,
                &UpdateKind::App { host: "newhost".to_string(), port: Some(0) },
            )
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
        assert!(body.contains("32400"));
    }

    async fn mcp_ops_with_template() -> Arc<MCPOperations> {
        let dir = tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("mcp_location_block.jinja"),
            "location = /mcp {\n proxy_pass $upstream_proto://$upstream_app:$upstream_port{{ mcp_path }};\n}\n",
        )
        .await
        .unwrap();
        let templates = Arc::new(TemplateManager::load(dir.path()).await.unwrap());
        Arc::new(MCPOperations::new(templates))
    }

    #[tokio::test]
    async fn add_mcp_through_updaters_does_not_require_oauth_discovery() {
        let updaters = ConfigFieldUpdaters::new(mcp_ops_with_template().await);
        let body = body_with_port(8096);
        let out = updaters
            .apply(
                std::path::Path::new("jellyfin.subdomain.conf"),
                &body,
                &UpdateKind::AddMcp { mcp_path: "/mcp".to_string() },
            )
            .unwrap();
        assert!(out.contains("location = /mcp"));
        assert!(out.contains("authelia-location.conf"));
    }
}
