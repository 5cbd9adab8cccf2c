//! HTTP Client Factory
//!
//! Provides a factory function for building reqwest clients with proxy support.

use std::time::Duration;

use research_desk_core::proxy::ProxyConfig;

use crate::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with the resolved proxy configuration.
///
/// - `Some(proxy)` -> configure proxy on the client
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(
    proxy: Option<&ProxyConfig>,
    timeout: Option<Duration>,
) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    match proxy {
        Some(cfg) => {
            let mut p = reqwest::Proxy::all(cfg.url()).map_err(|e| LlmError::InvalidRequest {
                message: format!("Invalid proxy {}: {}", cfg.url(), e),
            })?;
            if let (Some(u), Some(pw)) = (&cfg.username, &cfg.password) {
                p = p.basic_auth(u, pw);
            }
            builder = builder.proxy(p);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| LlmError::NetworkError {
        message: format!("Failed to build HTTP client: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_desk_core::proxy::ProxyProtocol;

    #[test]
    fn test_build_http_client_no_proxy() {
        assert!(build_http_client(None, None).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy_and_timeout() {
        let cfg = ProxyConfig {
            protocol: ProxyProtocol::Socks5,
            host: "127.0.0.1".to_string(),
            port: 1080,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };
        assert!(build_http_client(Some(&cfg), Some(Duration::from_secs(30))).is_ok());
    }
}
