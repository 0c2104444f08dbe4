//! Proxy rule HTTP client configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Whole-request timeout for upstream calls
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Accept self-signed upstream certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            accept_invalid_certs: false,
        }
    }
}
