mod basic;
mod keys;
mod normalize;

pub use basic::BasicConfig;
pub use keys::{ProviderKeyEntry, UpstreamKeysConfig};
pub use normalize::to_yaml_bytes;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Top-level application configuration, parsed from a single YAML document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(flatten)]
    pub basic: BasicConfig,

    #[serde(flatten)]
    pub keys: UpstreamKeysConfig,
}

impl Config {
    /// Builds a Figment that merges defaults, an optional YAML file, and
    /// `RELAYGATE_`-prefixed environment variable overrides (highest
    /// precedence), mirroring the teacher's layered-merge config stack with
    /// YAML instead of TOML.
    pub fn figment(path: &Path) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if path.is_file() {
            figment.merge(Yaml::file(path))
        } else {
            figment
        };
        figment.merge(Env::prefixed("RELAYGATE_").split("__"))
    }

    /// Loads configuration from `path` if present, else defaults only.
    /// Returns `None` when `optional` is false and the file is missing.
    pub fn load_optional(path: &Path, optional: bool) -> Option<Self> {
        if !optional && !path.is_file() {
            return None;
        }
        let mut cfg: Self = Self::figment(path)
            .extract()
            .unwrap_or_else(|err| panic!("failed to extract configuration from {path:?}: {err}"));
        cfg.keys.normalize();
        Some(cfg)
    }

    /// Loads configuration from the default path and validates required
    /// fields. Panics (at startup, not at request time) when the inbound
    /// access-key list is empty, since that would otherwise silently lock
    /// every client out.
    pub fn from_yaml() -> Self {
        Self::from_yaml_path(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn from_yaml_path(path: &Path) -> Self {
        let cfg = Self::load_optional(path, true)
            .unwrap_or_else(|| panic!("config file not found: {path:?}"));
        if cfg.keys.api_keys.is_empty() {
            panic!("api-keys must contain at least one inbound key");
        }
        cfg
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
