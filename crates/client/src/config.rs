//! Client configuration and endpoint derivation.

use std::time::Duration;

use crate::ws::ReconnectConfig;

/// Configuration for a [`crate::session::Session`] and its REST client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `https://api.telecare.example/api/v1`.
    /// A bare host is accepted; local hosts get `http`, everything else
    /// `https`.
    pub base_url: String,
    /// REST path suffix stripped off `base_url` to derive the realtime
    /// endpoint.
    pub rest_suffix: String,
    /// Hard timeout on the initial transport handshake.
    pub connect_timeout: Duration,
    /// How long a `join_room` call waits for its acknowledgment.
    pub join_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// The normalized REST base URL (scheme always present).
    pub fn api_base_url(&self) -> String {
        let raw = self.base_url.trim_end_matches('/');
        if raw.contains("://") {
            return raw.to_string();
        }
        if is_local_host(raw) {
            format!("http://{raw}")
        } else {
            format!("https://{raw}")
        }
    }

    /// Resolve an API path against the base URL.
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.api_base_url();
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// The realtime endpoint: base URL with the REST suffix stripped and
    /// the scheme mapped `http(s)` to `ws(s)`.
    pub fn realtime_url(&self) -> String {
        let base = self.api_base_url();
        let suffix = self.rest_suffix.trim_end_matches('/');
        let stripped = if !suffix.is_empty() && base.ends_with(suffix) {
            base[..base.len() - suffix.len()].trim_end_matches('/').to_string()
        } else {
            base
        };
        http_to_ws(&stripped)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            rest_suffix: "/api/v1".to_string(),
            connect_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Convert an HTTP/HTTPS URL to WS/WSS.
fn http_to_ws(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

/// Check if a host is a local/development address.
fn is_local_host(host: &str) -> bool {
    let host_part = host.split(':').next().unwrap_or(host);
    host_part == "localhost"
        || host_part == "127.0.0.1"
        || host_part == "0.0.0.0"
        || host_part.starts_with("192.168.")
        || host_part.starts_with("10.")
}
