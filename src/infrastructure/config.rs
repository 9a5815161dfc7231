//! Configuration
//!
//! 配置只在启动时加载一次，之后不可变。
//!
//! ## Sources (later wins)
//! 1. Built-in defaults (every exporter disabled)
//! 2. The first `config.yaml` found in:
//!    - `$XDG_CONFIG_HOME/workctl`
//!    - each `$XDG_CONFIG_DIRS/workctl` (default `/etc/xdg/workctl`)
//!    - `/etc/workctl`
//! 3. Environment variables prefixed with `WORKCTL_`, `_` separating levels,
//!    e.g. `WORKCTL_OTEL_EXPORTER_TRACES_ENDPOINT`
//!
//! ## Example
//! ```yaml
//! otel:
//!   exporter:
//!     traces:
//!       endpoint: "http://localhost:4318/v1/traces"
//!       headers:
//!         Authorization: "Bearer token"
//!     metrics:
//!       endpoint: "http://localhost:4318/v1/metrics"
//! ```

use directories::BaseDirs;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory name under each config root.
pub const APP_NAME: &str = "workctl";
/// File looked up in every search directory.
pub const CONFIG_FILE: &str = "config.yaml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "WORKCTL_";

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub otel: OtelConfig,
}

/// OpenTelemetry 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtelConfig {
    pub exporter: ExporterConfig,
}

/// Exporter settings, one block per signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub traces: OtlpConfig,
    pub metrics: OtlpConfig,
}

/// OTLP/HTTP settings for one signal.
///
/// An empty `endpoint` disables the signal; `headers` are ignored then.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtlpConfig {
    /// Full URL, e.g. `http://localhost:4318/v1/traces`
    pub endpoint: String,
    /// Extra HTTP headers sent with every export request
    pub headers: HashMap<String, String>,
}

impl OtlpConfig {
    /// Whether this signal should be exported at all.
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] figment::Error),
}

impl Config {
    /// Load from the standard search path plus environment overrides.
    ///
    /// Finding no config file at all is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_search_dirs())
    }

    /// Load using an explicit list of directories to search for [`CONFIG_FILE`].
    pub fn load_from(search_dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match find_config_file(search_dirs) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                figment = figment.merge(Yaml::file(path));
            }
            None => tracing::debug!("no config file found, using defaults"),
        }

        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("_"))
            .extract()?;
        Ok(config)
    }
}

/// The first existing `config.yaml` among `search_dirs`.
pub fn find_config_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.is_file())
}

/// XDG config home, XDG config dirs, then `/etc`.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(base) = BaseDirs::new() {
        dirs.push(base.config_dir().join(APP_NAME));
    }

    let xdg_dirs = std::env::var_os("XDG_CONFIG_DIRS")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/etc/xdg".into());
    dirs.extend(std::env::split_paths(&xdg_dirs).map(|dir| dir.join(APP_NAME)));

    dirs.push(Path::new("/etc").join(APP_NAME));
    dirs
}
