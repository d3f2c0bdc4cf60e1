//! HTTP server configuration

use serde::Deserialize;

/// Configuration for the API server.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind, e.g. `0.0.0.0:3000` or `[::]:3000`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Client IPs allowed to use the API. An empty list leaves the API
    /// open (the expected setup behind a reverse proxy).
    #[serde(default)]
    pub allowed_ips: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum request body size. Needs headroom for base64 attachments.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_listen_address() -> String {
    "0.0.0.0:3000".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            allowed_ips: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
