use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Core server configuration — the `basic` fields of the YAML config document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen port. YAML: `port`. Default: `8188`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory holding one JSON file per file-backed credential.
    /// YAML: `auth-dir`. Default: `./auths`.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: PathBuf,

    /// Enables verbose logging and relaxes a handful of startup checks.
    /// YAML: `debug`. Default: `false`.
    #[serde(default)]
    pub debug: bool,

    /// Default outbound proxy applied to upstream HTTP clients unless a
    /// credential overrides it. YAML: `proxy-url`.
    #[serde(default)]
    pub proxy_url: Option<url::Url>,

    /// Attempts per inbound request across distinct credentials.
    /// YAML: `request-retry`. Default: `3`.
    #[serde(default = "default_request_retry")]
    pub request_retry: usize,

    /// Upper bound, in seconds, on exponential quota-backoff. YAML:
    /// `max-retry-interval`. Units are assumed to be seconds (see
    /// `DESIGN.md`, "MaxRetryInterval units").
    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval: u64,

    /// Whether every inbound/outbound request is logged at info level.
    /// YAML: `request-log`. Default: `false`.
    #[serde(default)]
    pub request_log: bool,

    /// Whether tracing output is additionally mirrored to a rotating file
    /// sink rather than only stdout. YAML: `logging-to-file`.
    #[serde(default)]
    pub logging_to_file: bool,

    /// Opt-in anonymous usage statistics. YAML: `usage-statistics-enabled`.
    #[serde(default)]
    pub usage_statistics_enabled: bool,

    /// Enables the (out-of-scope) management/admin HTTP surface when set.
    /// YAML: `remote-management`. Kept only so the config document round-trips;
    /// this crate never starts the admin surface.
    #[serde(default)]
    pub remote_management: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_dir: default_auth_dir(),
            debug: false,
            proxy_url: None,
            request_retry: default_request_retry(),
            max_retry_interval: default_max_retry_interval(),
            request_log: false,
            logging_to_file: false,
            usage_statistics_enabled: false,
            remote_management: false,
        }
    }
}

fn default_port() -> u16 {
    8188
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("./auths")
}

fn default_request_retry() -> usize {
    3
}

fn default_max_retry_interval() -> u64 {
    60
}
