//! Multi-endpoint, bounded-time HTTP health probing.
//!
//! `reqwest` fixes a client's redirect policy at construction time, so
//! this holds two pooled clients — one per policy — rather than
//! rebuilding a client per request.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::HealthError;

const CANDIDATE_PATHS: &[&str] = &["/health", "/mcp", "/"];
const MAX_REDIRECTS: usize = 5;

/// Input to a single probe.
#[derive(Debug, Clone)]
pub struct HealthRequest {
    /// Host-only domain, no scheme (e.g. `ai.example.com`).
    pub domain: String,
    /// Total probe budget in seconds, split evenly across candidates.
    pub timeout_secs: u64,
    pub follow_redirects: bool,
}

/// Outcome of a probe. Always a value, never an error, as long as the
/// probe ran to completion — a negative result is `success: false`, not
/// an `Err`.
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub success: bool,
    pub url: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub redirect_chain_tail: Option<String>,
}

/// Bounded multi-endpoint HTTP prober sharing a pooled connection client
/// per redirect policy.
pub struct HealthMonitor {
    follow: Client,
    no_follow: Client,
}

impl HealthMonitor {
    pub fn new() -> Result<Self, HealthError> {
        let follow = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(HealthError::Transport)?;
        let no_follow = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(HealthError::Transport)?;
        Ok(Self { follow, no_follow })
    }

    /// Try `/health`, `/mcp`, `/` in order over HTTPS, stopping at the
    /// first candidate whose response meets the classification success
    /// rule.
    pub async fn probe(&self, req: &HealthRequest) -> Result<HealthResult, HealthError> {
        validate_domain(&req.domain)?;
        if !(1..=300).contains(&req.timeout_secs) {
            return Err(HealthError::InvalidTimeout(req.timeout_secs));
        }

        let client = if req.follow_redirects { &self.follow } else { &self.no_follow };
        let per_attempt = Duration::from_secs(
            req.timeout_secs.div_ceil(CANDIDATE_PATHS.len() as u64).max(1),
        );

        let start = Instant::now();
        let mut last_error: Option<String> = None;
        let mut last_status: Option<u16> = None;
        let mut last_url = String::new();

        for path in CANDIDATE_PATHS {
            let url = format!("https://{}{path}", req.domain);
            last_url = url.clone();
            debug!(%url, ?per_attempt, "probing health candidate");

            let attempt = tokio::time::timeout(per_attempt, client.get(&url).send()).await;
            match attempt {
                Ok(Ok(response)) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());
                    let final_url = response.url().to_string();
                    if classify_success(status, path, req.follow_redirects) {
                        return Ok(HealthResult {
                            success: true,
                            url: final_url,
                            status: Some(status.as_u16()),
                            elapsed_ms: start.elapsed().as_millis() as u64,
                            error: None,
                            redirect_chain_tail: if final_url != url { Some(final_url) } else { None },
                        });
                    }
                    last_error = Some(format!("{status} at {path}"));
                }
                Ok(Err(e)) => {
                    warn!(%url, error = %e, "probe transport error");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!(%url, "probe timed out");
                    last_error = Some(format!("timed out after {per_attempt:?}"));
                }
            }
        }

        Ok(HealthResult {
            success: false,
            url: last_url,
            status: last_status,
            elapsed_ms: start.elapsed().as_millis() as u64,
            error: last_error,
            redirect_chain_tail: None,
        })
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new().expect("building the default HTTP clients cannot fail")
    }
}

fn classify_success(status: StatusCode, attempted_path: &str, follow_redirects: bool) -> bool {
    if status.is_success() {
        return true;
    }
    if status.is_redirection() {
        // reqwest already followed redirects internally when the client's
        // policy allows it; a 3xx observed here means redirects were
        // either disabled or the policy's hop limit was exceeded. Either
        // way this candidate did not resolve to a 2xx.
        let _ = follow_redirects;
        return false;
    }
    if status.as_u16() / 100 == 4 {
        let gate_status = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_ACCEPTABLE);
        return gate_status && attempted_path == "/mcp";
    }
    false
}

fn validate_domain(domain: &str) -> Result<(), HealthError> {
    if domain.is_empty() || domain.len() > 253 {
        return Err(HealthError::InvalidDomain(domain.to_string()));
    }
    if domain.contains("://") || domain.contains('/') || domain.chars().any(|c| c.is_whitespace()) {
        return Err(HealthError::InvalidDomain(domain.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_2xx_as_success_regardless_of_path() {
        assert!(classify_success(StatusCode::OK, "/health", true));
        assert!(classify_success(StatusCode::OK, "/", true));
    }

    #[test]
    fn classifies_401_as_success_only_at_mcp_path() {
        assert!(classify_success(StatusCode::UNAUTHORIZED, "/mcp", true));
        assert!(!classify_success(StatusCode::UNAUTHORIZED, "/health", true));
        assert!(!classify_success(StatusCode::UNAUTHORIZED, "/", true));
    }

    #[test]
    fn classifies_403_and_406_as_success_only_at_mcp_path() {
        assert!(classify_success(StatusCode::FORBIDDEN, "/mcp", true));
        assert!(classify_success(StatusCode::NOT_ACCEPTABLE, "/mcp", true));
        assert!(!classify_success(StatusCode::FORBIDDEN, "/", true));
    }

    #[test]
    fn classifies_other_4xx_as_failure_even_at_mcp_path() {
        assert!(!classify_success(StatusCode::NOT_FOUND, "/mcp", true));
        assert!(!classify_success(StatusCode::BAD_REQUEST, "/mcp", true));
    }

    #[test]
    fn classifies_5xx_as_failure() {
        assert!(!classify_success(StatusCode::INTERNAL_SERVER_ERROR, "/health", true));
    }

    #[test]
    fn classifies_3xx_without_following_as_failure() {
        assert!(!classify_success(StatusCode::MOVED_PERMANENTLY, "/health", false));
    }

    #[test]
    fn rejects_domain_with_scheme_or_path() {
        assert!(validate_domain("https://example.com").is_err());
        assert!(validate_domain("example.com/path").is_err());
        assert!(validate_domain("example.com").is_ok());
    }

    #[tokio::test]
    async fn probe_rejects_timeout_out_of_range() {
        let monitor = HealthMonitor::new().unwrap();
        let req = HealthRequest {
            domain: "example.com".into(),
            timeout_secs: 0,
            follow_redirects: true,
        };
        let err = monitor.probe(&req).await.unwrap_err();
        assert!(matches!(err, HealthError::InvalidTimeout(0)));
    }

    #[tokio::test]
    async fn probe_rejects_malformed_domain() {
        let monitor = HealthMonitor::new().unwrap();
        let req = HealthRequest {
            domain: "https://example.com".into(),
            timeout_secs: 5,
            follow_redirects: true,
        };
        let err = monitor.probe(&req).await.unwrap_err();
        assert!(matches!(err, HealthError::InvalidDomain(_)));
    }
}
