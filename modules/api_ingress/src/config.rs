use serde::{Deserialize, Serialize};

const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// HTTP host settings, derived from the `server` section of the app config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiIngressConfig {
    pub bind_addr: String,
    #[serde(default)]
    pub cors_enabled: bool,
    /// 0 disables the handler timeout.
    #[serde(default)]
    pub timeout_sec: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8087".to_string(),
            cors_enabled: false,
            timeout_sec: 30,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl From<&runtime::ServerConfig> for ApiIngressConfig {
    fn from(server: &runtime::ServerConfig) -> Self {
        Self {
            bind_addr: format!("{}:{}", server.host, server.port),
            cors_enabled: server.cors_enabled,
            timeout_sec: server.timeout_sec,
            ..Default::default()
        }
    }
}
