//! Post-render structural checks. These run against every rendered or
//! hand-edited config body before it is ever written to disk; a file that
//! fails them is never written.

pub struct StructuralInput<'a> {
    pub body: &'a str,
    pub mcp_enabled: bool,
    pub enable_quic: bool,
    pub auth_method: &'a str,
    /// Whether an `mcp_enabled` body must carry the OAuth discovery
    /// endpoint. Full template renders always require it; a narrow
    /// `add_mcp` surgical edit only requires it if the file already had
    /// it before the edit (see `ConfigFieldUpdaters::apply`).
    pub require_oauth_discovery: bool,
}

pub fn check(input: &StructuralInput<'_>) -> Result<(), String> {
    if !has_balanced_server_block(input.body) {
        return Err("missing balanced server { } block".into());
    }
    for marker in ["set $upstream_app", "set $upstream_port", "set $upstream_proto"] {
        if !input.body.contains(marker) {
            return Err(format!("missing required directive: {marker}"));
        }
    }
    if !input.body.contains("proxy_pass") {
        return Err("missing proxy_pass directive".into());
    }
    if input.mcp_enabled {
        if !input.body.contains("location /mcp") {
            return Err("mcp_enabled but no location /mcp block".into());
        }
        if input.require_oauth_discovery && !input.body.contains("/.well-known/oauth-authorization-server") {
            return Err("mcp_enabled but missing oauth discovery endpoint".into());
        }
    }
    if input.enable_quic {
        if !input.body.contains("listen 443 quic") {
            return Err("enable_quic but no listen 443 quic directive".into());
        }
        if !input.body.contains("Alt-Svc") {
            return Err("enable_quic but no Alt-Svc header directive".into());
        }
    }
    if input.auth_method != "none" {
        let include = format!("{}-location.conf", input.auth_method);
        if input.auth_method != "basic" && !input.body.contains(&include) {
            return Err(format!("auth_method {} but missing {include} include", input.auth_method));
        }
        if input.auth_method == "basic" && !input.body.contains("auth_basic") {
            return Err("auth_method basic but missing auth_basic directive".into());
        }
    }
    Ok(())
}

/// True iff the body contains at least one `server {` whose brace nesting
/// returns to zero before end of input.
pub fn has_balanced_server_block(body: &str) -> bool {
    find_outermost_server_block(body).is_some()
}

/// Returns the byte range `[start, end)` of the outermost `server { ... }`
/// block, where `end` points one past the matching closing brace.
pub fn find_outermost_server_block(body: &str) -> Option<(usize, usize)> {
    let bytes = body.as_bytes();
    let mut search_from = 0usize;
    while let Some(rel) = body[search_from..].find("server") {
        let kw_start = search_from + rel;
        let mut i = kw_start + "server".len();
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'{' {
            search_from = kw_start + 1;
            continue;
        }
        let brace_start = i;
        let mut depth: i32 = 0;
        let mut j = brace_start;
        while j < bytes.len() {
            match bytes[j] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((kw_start, j + 1));
                    }
                }
                _ => {}
            }
            j += 1;
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_outermost_server_block_ignoring_nested_braces() {
        let body = "upstream x { a; }\nserver {\n location / { proxy_pass http://x; }\n}\n";
        let (start, end) = find_outermost_server_block(body).unwrap();
        assert!(body[start..end].starts_with("server"));
        assert!(body[start..end].ends_with('}'));
    }

    #[test]
    fn rejects_unbalanced_server_block() {
        let body = "server {\n location / {\n";
        assert!(find_outermost_server_block(body).is_none());
    }

    #[test]
    fn check_requires_upstream_directives() {
        let input = StructuralInput {
            body: "server { proxy_pass http://x; }",
            mcp_enabled: false,
            enable_quic: false,
            auth_method: "none",
            require_oauth_discovery: true,
        };
        assert!(check(&input).is_err());
    }

    #[test]
    fn check_skips_oauth_requirement_when_not_required() {
        let input = StructuralInput {
            body: "server {\n set $upstream_app \"a\"; set $upstream_port \"1\"; set $upstream_proto \"http\";\n proxy_pass http://x;\n location /mcp { proxy_pass http://x; }\n}",
            mcp_enabled: true,
            enable_quic: false,
            auth_method: "none",
            require_oauth_discovery: false,
        };
        assert!(check(&input).is_ok());
    }

    #[test]
    fn check_enforces_oauth_requirement_when_required() {
        let input = StructuralInput {
            body: "server {\n set $upstream_app \"a\"; set $upstream_port \"1\"; set $upstream_proto \"http\";\n proxy_pass http://x;\n location /mcp { proxy_pass http://x; }\n}",
            mcp_enabled: true,
            enable_quic: false,
            auth_method: "none",
            require_oauth_discovery: true,
        };
        assert!(check(&input).is_err());
    }
}
