use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// The platform's primary domain. Pages served from it (or a subdomain)
/// stream against the dedicated API subdomain.
pub const PRIMARY_DOMAIN: &str = "dalil.app";

/// Fixed production endpoint, also the fallback for headless contexts.
pub const PRODUCTION_ENDPOINT: &str = "wss://api.dalil.app/ws/search";

/// Path of the search stream on whatever host ends up selected.
const STREAM_PATH: &str = "/ws/search";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

/// Origin the client is embedded in. `None` models a headless
/// (server-rendering) context with no page to derive an endpoint from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOrigin {
    /// "https" or "http"; anything else is treated as insecure.
    pub scheme: String,
    /// Host (and optional port) of the embedding page.
    pub host: String,
}

/// Inputs to endpoint resolution, captured once at construction.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub mode: BuildMode,
    /// Configured backend override, honored in development when it points at
    /// a loopback host.
    pub backend_url: Option<Url>,
    pub page_origin: Option<PageOrigin>,
}

fn production_endpoint() -> Url {
    Url::parse(PRODUCTION_ENDPOINT).expect("production endpoint constant must parse")
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}

/// Resolves the stream endpoint. Policy, in order:
/// 1. headless context: the fixed production endpoint;
/// 2. development build: a configured loopback backend wins, anything else
///    falls back to production;
/// 3. production build: pages on the primary domain use the API subdomain,
///    other deployments derive the endpoint from their own scheme and host.
pub fn resolve_endpoint(config: &EndpointConfig) -> Url {
    let Some(origin) = &config.page_origin else {
        return production_endpoint();
    };

    match config.mode {
        BuildMode::Development => match &config.backend_url {
            Some(backend) if is_loopback(backend) => backend.clone(),
            _ => production_endpoint(),
        },
        BuildMode::Production => {
            let on_primary = origin.host == PRIMARY_DOMAIN
                || origin
                    .host
                    .strip_suffix(PRIMARY_DOMAIN)
                    .is_some_and(|prefix| prefix.ends_with('.'));
            if on_primary {
                return production_endpoint();
            }
            let scheme = if origin.scheme == "https" { "wss" } else { "ws" };
            Url::parse(&format!("{scheme}://{}{STREAM_PATH}", origin.host))
                .unwrap_or_else(|_| production_endpoint())
        }
    }
}

/// Runtime configuration of the streaming client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Resolved stream endpoint, fixed for the client's lifetime.
    pub endpoint: Url,
    /// Base delay for reconnect backoff.
    pub reconnect_base_delay: Duration,
    /// Cap for reconnect backoff.
    pub reconnect_max_delay: Duration,
    /// Bounded wait for a single device position fix.
    pub location_fix_timeout: Duration,
}

impl StreamConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            location_fix_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(scheme: &str, host: &str) -> Option<PageOrigin> {
        Some(PageOrigin {
            scheme: scheme.to_string(),
            host: host.to_string(),
        })
    }

    #[test]
    fn headless_context_uses_production_endpoint() {
        let config = EndpointConfig {
            mode: BuildMode::Production,
            backend_url: Some(Url::parse("ws://localhost:5000/ws/search").unwrap()),
            page_origin: None,
        };
        assert_eq!(resolve_endpoint(&config).as_str(), PRODUCTION_ENDPOINT);
    }

    #[test]
    fn development_honors_loopback_backend() {
        let backend = Url::parse("ws://localhost:5000/ws/search").unwrap();
        let config = EndpointConfig {
            mode: BuildMode::Development,
            backend_url: Some(backend.clone()),
            page_origin: origin("http", "localhost:3000"),
        };
        assert_eq!(resolve_endpoint(&config), backend);
    }

    #[test]
    fn development_ignores_remote_backend() {
        let config = EndpointConfig {
            mode: BuildMode::Development,
            backend_url: Some(Url::parse("wss://staging.example.net/ws/search").unwrap()),
            page_origin: origin("http", "localhost:3000"),
        };
        assert_eq!(resolve_endpoint(&config).as_str(), PRODUCTION_ENDPOINT);
    }

    #[test]
    fn production_primary_domain_uses_api_subdomain() {
        for host in [PRIMARY_DOMAIN, "www.dalil.app"] {
            let config = EndpointConfig {
                mode: BuildMode::Production,
                backend_url: None,
                page_origin: origin("https", host),
            };
            assert_eq!(resolve_endpoint(&config).as_str(), PRODUCTION_ENDPOINT);
        }
    }

    #[test]
    fn production_unrelated_domain_is_not_treated_as_primary() {
        // A suffix match alone must not count: notdalil.app is someone else.
        let config = EndpointConfig {
            mode: BuildMode::Production,
            backend_url: None,
            page_origin: origin("https", "notdalil.app"),
        };
        assert_eq!(
            resolve_endpoint(&config).as_str(),
            "wss://notdalil.app/ws/search"
        );
    }

    #[test]
    fn production_other_host_derives_from_page_origin() {
        let config = EndpointConfig {
            mode: BuildMode::Production,
            backend_url: None,
            page_origin: origin("https", "directory.partner.example"),
        };
        assert_eq!(
            resolve_endpoint(&config).as_str(),
            "wss://directory.partner.example/ws/search"
        );

        let insecure = EndpointConfig {
            mode: BuildMode::Production,
            backend_url: None,
            page_origin: origin("http", "10.0.0.5:8080"),
        };
        assert_eq!(
            resolve_endpoint(&insecure).as_str(),
            "ws://10.0.0.5:8080/ws/search"
        );
    }
}
